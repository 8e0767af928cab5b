//
// Copyright (c) The yangtool Contributors
//
// SPDX-License-Identifier: MIT
//

//! XPath 1.0 tokenization, reusing the generic [`crate::token::TokenChain`]
//! shared with the YANG statement lexer.

use crate::error::{Error, ErrorCode, Position, Result};
use crate::token::{Spanned, TokenChain};

#[derive(Clone, Debug, PartialEq)]
pub enum XPathToken {
    /// An `NCName` or qualified `prefix:local` name. Keyword-like operators
    /// (`and`, `or`, `div`, `mod`) and axis/node-type names lex to this
    /// same variant; the parser resolves them contextually.
    Name(String),
    /// `$name` or `$prefix:name`.
    VarRef(String),
    Number(f64),
    Literal(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    At,
    Dot,
    DotDot,
    Slash,
    SlashSlash,
    Pipe,
    Plus,
    Minus,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Star,
    ColonColon,
    Eof,
}

pub type XPathChain = TokenChain<XPathToken>;

struct Lexer<'a> {
    module: Option<String>,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: u32,
    column: u32,
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str, module: Option<String>) -> Self {
        Self {
            module,
            chars: src.char_indices().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn pos(&self) -> Position {
        Position::new(self.module.clone(), self.line, self.column)
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        self.column += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        }
        Some(c)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.chars.clone().nth(n).map(|(_, c)| c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek_char(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn lex_name_text(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek_char() {
            if is_name_char(c) {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        s
    }

    /// Lexes an `NCName` or `prefix:local`, carefully not consuming a `::`
    /// axis separator as part of the name.
    fn lex_qname(&mut self) -> String {
        let mut s = self.lex_name_text();
        if self.peek_char() == Some(':') && self.peek_nth(1) != Some(':') {
            if let Some(c2) = self.peek_nth(1) {
                if is_name_start(c2) {
                    self.bump();
                    s.push(':');
                    s.push_str(&self.lex_name_text());
                } else if c2 == '*' {
                    // `prefix:*` wildcard NameTest.
                    self.bump();
                    self.bump();
                    s.push(':');
                    s.push('*');
                }
            }
        }
        s
    }

    fn lex_number(&mut self) -> Result<f64> {
        let mut s = String::new();
        while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
            s.push(self.bump().unwrap());
        }
        if self.peek_char() == Some('.') {
            s.push(self.bump().unwrap());
            while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
                s.push(self.bump().unwrap());
            }
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            let save = self.chars.clone();
            let (save_line, save_col) = (self.line, self.column);
            let mut exp = String::new();
            exp.push(self.bump().unwrap());
            if matches!(self.peek_char(), Some('+') | Some('-')) {
                exp.push(self.bump().unwrap());
            }
            if matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
                while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
                    exp.push(self.bump().unwrap());
                }
                s.push_str(&exp);
            } else {
                self.chars = save;
                self.line = save_line;
                self.column = save_col;
            }
        }
        s.parse().map_err(|_| {
            Error::fatal(ErrorCode::WrongToken, format!("invalid XPath number '{s}'"))
        })
    }

    fn lex_literal(&mut self, quote: char) -> Result<String> {
        let mut s = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(Error::fatal(
                        ErrorCode::WrongToken,
                        "unterminated XPath string literal",
                    ))
                }
                Some(c) if c == quote => break,
                Some(c) => s.push(c),
            }
        }
        Ok(s)
    }

    fn next_token(&mut self) -> Result<Spanned<XPathToken>> {
        self.skip_ws();
        let pos = self.pos();
        let Some(c) = self.peek_char() else {
            return Ok(Spanned::new(XPathToken::Eof, pos));
        };
        let tok = match c {
            '(' => {
                self.bump();
                XPathToken::LParen
            }
            ')' => {
                self.bump();
                XPathToken::RParen
            }
            '[' => {
                self.bump();
                XPathToken::LBracket
            }
            ']' => {
                self.bump();
                XPathToken::RBracket
            }
            ',' => {
                self.bump();
                XPathToken::Comma
            }
            '@' => {
                self.bump();
                XPathToken::At
            }
            '|' => {
                self.bump();
                XPathToken::Pipe
            }
            '+' => {
                self.bump();
                XPathToken::Plus
            }
            '-' => {
                self.bump();
                XPathToken::Minus
            }
            '*' => {
                self.bump();
                XPathToken::Star
            }
            '=' => {
                self.bump();
                XPathToken::Eq
            }
            '!' => {
                self.bump();
                if self.peek_char() == Some('=') {
                    self.bump();
                    XPathToken::Ne
                } else {
                    return Err(Error::fatal_at(
                        ErrorCode::WrongToken,
                        "expected '!=' ",
                        pos,
                    ));
                }
            }
            '<' => {
                self.bump();
                if self.peek_char() == Some('=') {
                    self.bump();
                    XPathToken::Le
                } else {
                    XPathToken::Lt
                }
            }
            '>' => {
                self.bump();
                if self.peek_char() == Some('=') {
                    self.bump();
                    XPathToken::Ge
                } else {
                    XPathToken::Gt
                }
            }
            ':' => {
                self.bump();
                if self.peek_char() == Some(':') {
                    self.bump();
                    XPathToken::ColonColon
                } else {
                    return Err(Error::fatal_at(ErrorCode::WrongToken, "unexpected ':'", pos));
                }
            }
            '/' => {
                self.bump();
                if self.peek_char() == Some('/') {
                    self.bump();
                    XPathToken::SlashSlash
                } else {
                    XPathToken::Slash
                }
            }
            '.' => {
                if matches!(self.peek_nth(1), Some(d) if d.is_ascii_digit()) {
                    XPathToken::Number(self.lex_number()?)
                } else {
                    self.bump();
                    if self.peek_char() == Some('.') {
                        self.bump();
                        XPathToken::DotDot
                    } else {
                        XPathToken::Dot
                    }
                }
            }
            '"' | '\'' => {
                self.bump();
                XPathToken::Literal(self.lex_literal(c)?)
            }
            '$' => {
                self.bump();
                let name = self.lex_qname();
                if name.is_empty() {
                    return Err(Error::fatal_at(
                        ErrorCode::WrongToken,
                        "expected variable name after '$'",
                        pos,
                    ));
                }
                XPathToken::VarRef(name)
            }
            c if c.is_ascii_digit() => XPathToken::Number(self.lex_number()?),
            c if is_name_start(c) => XPathToken::Name(self.lex_qname()),
            other => {
                return Err(Error::fatal_at(
                    ErrorCode::WrongToken,
                    format!("unexpected character '{other}' in XPath expression"),
                    pos,
                ))
            }
        };
        Ok(Spanned::new(tok, pos))
    }

    fn tokenize(mut self) -> Result<(Vec<Spanned<XPathToken>>, Position)> {
        let mut out = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_eof = matches!(tok.kind, XPathToken::Eof);
            let eof_pos = tok.pos.clone();
            out.push(tok);
            if is_eof {
                return Ok((out, eof_pos));
            }
        }
    }
}

/// Tokenizes an XPath 1.0 expression into a re-seekable [`XPathChain`].
pub fn tokenize(src: &str, module: Option<String>) -> Result<XPathChain> {
    let (tokens, eof_pos) = Lexer::new(src, module).tokenize()?;
    Ok(TokenChain::new(tokens, XPathToken::Eof, eof_pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<XPathToken> {
        let mut chain = tokenize(src, None).unwrap();
        let mut out = Vec::new();
        loop {
            let t = chain.advance();
            let eof = matches!(t.kind, XPathToken::Eof);
            out.push(t.kind);
            if eof {
                break;
            }
        }
        out
    }

    #[test]
    fn lexes_path_with_predicate_and_qname() {
        let toks = kinds("/p:a/p:b[. = 2]");
        assert_eq!(
            toks,
            vec![
                XPathToken::Slash,
                XPathToken::Name("p:a".to_string()),
                XPathToken::Slash,
                XPathToken::Name("p:b".to_string()),
                XPathToken::LBracket,
                XPathToken::Dot,
                XPathToken::Eq,
                XPathToken::Number(2.0),
                XPathToken::RBracket,
                XPathToken::Eof,
            ]
        );
    }

    #[test]
    fn distinguishes_axis_separator_from_qname_colon() {
        let toks = kinds("child::p:a");
        assert_eq!(
            toks,
            vec![
                XPathToken::Name("child".to_string()),
                XPathToken::ColonColon,
                XPathToken::Name("p:a".to_string()),
                XPathToken::Eof,
            ]
        );
    }

    #[test]
    fn lexes_real_number_with_exponent() {
        let toks = kinds("1.5e3");
        assert_eq!(toks, vec![XPathToken::Number(1500.0), XPathToken::Eof]);
    }

    #[test]
    fn lexes_double_slash_and_dotdot() {
        assert_eq!(
            kinds("//.."),
            vec![XPathToken::SlashSlash, XPathToken::DotDot, XPathToken::Eof]
        );
    }
}
