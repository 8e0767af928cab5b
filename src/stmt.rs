//
// Copyright (c) The yangtool Contributors
//
// SPDX-License-Identifier: MIT
//

//! The generic YANG statement grammar (RFC 7950 §6.3):
//!
//! ```text
//! statement = keyword [argument] (";" / "{" *statement "}")
//! keyword   = identifier / prefix ":" identifier
//! ```
//!
//! This is the first schema-builder pass ("Parse"): it turns YANG source
//! text into an untyped [`Stmt`] tree, preserving declaration order and
//! source position, without knowing what any particular keyword means.
//! The semantic walker in [`crate::schema`] interprets the tree's keywords
//! afterwards.

use crate::error::{Error, ErrorCode, Position, Result};
use crate::token::{Spanned, TokenChain};

#[derive(Clone, Debug, PartialEq)]
pub enum StmtToken {
    Identifier(String),
    /// A quoted or unquoted argument string. YANG allows
    /// `"part one" + "part two"` concatenation; the lexer already joins
    /// those into one token.
    Arg(String),
    LBrace,
    RBrace,
    Semicolon,
    Eof,
}

/// One parsed YANG statement and its substatements.
#[derive(Clone, Debug)]
pub struct Stmt {
    /// `None` prefix means the keyword is a plain YANG keyword (`container`,
    /// `leaf`, ...); `Some(prefix)` means an extension statement
    /// (`myext:foo`).
    pub prefix: Option<String>,
    pub keyword: String,
    pub argument: Option<String>,
    pub substatements: Vec<Stmt>,
    pub pos: Position,
}

impl Stmt {
    /// Returns the first substatement with the given keyword, if any.
    pub fn child(&self, keyword: &str) -> Option<&Stmt> {
        self.substatements.iter().find(|s| s.keyword == keyword)
    }

    /// Returns all substatements with the given keyword, in document order.
    pub fn children(&self, keyword: &str) -> impl Iterator<Item = &Stmt> {
        self.substatements.iter().filter(move |s| s.keyword == keyword)
    }

    pub fn arg(&self) -> Result<&str> {
        self.argument.as_deref().ok_or_else(|| {
            Error::fatal_at(
                ErrorCode::WrongToken,
                format!("statement '{}' requires an argument", self.keyword),
                self.pos.clone(),
            )
        })
    }
}

struct Lexer<'a> {
    module: Option<String>,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    src: &'a str,
    line: u32,
    column: u32,
    last_pos: Position,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str, module: Option<String>) -> Self {
        Self {
            module,
            chars: src.char_indices().peekable(),
            src,
            line: 1,
            column: 1,
            last_pos: Position::default(),
        }
    }

    fn pos(&self) -> Position {
        Position::new(self.module.clone(), self.line, self.column)
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    let mut clone = self.chars.clone();
                    clone.next();
                    match clone.peek() {
                        Some(&(_, '/')) => {
                            self.bump();
                            self.bump();
                            while !matches!(self.peek_char(), None | Some('\n')) {
                                self.bump();
                            }
                        }
                        Some(&(_, '*')) => {
                            self.bump();
                            self.bump();
                            loop {
                                match self.bump() {
                                    None => break,
                                    Some('*') if self.peek_char() == Some('/') => {
                                        self.bump();
                                        break;
                                    }
                                    _ => {}
                                }
                            }
                        }
                        _ => break,
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_quoted(&mut self, quote: char) -> Result<String> {
        let mut s = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(Error::fatal_at(
                        ErrorCode::WrongToken,
                        "unterminated quoted string",
                        self.last_pos.clone(),
                    ))
                }
                Some(c) if c == quote => break,
                Some('\\') if quote == '"' => match self.bump() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('"') => s.push('"'),
                    Some('\\') => s.push('\\'),
                    Some(other) => s.push(other),
                    None => {
                        return Err(Error::fatal_at(
                            ErrorCode::WrongToken,
                            "unterminated escape in quoted string",
                            self.last_pos.clone(),
                        ))
                    }
                },
                Some(c) => s.push(c),
            }
        }
        Ok(s)
    }

    fn lex_unquoted(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() || matches!(c, '{' | '}' | ';' | '"' | '\'') {
                break;
            }
            s.push(c);
            self.bump();
        }
        s
    }

    fn next_token(&mut self) -> Result<Spanned<StmtToken>> {
        self.skip_trivia();
        self.last_pos = self.pos();
        let pos = self.last_pos.clone();
        match self.peek_char() {
            None => Ok(Spanned::new(StmtToken::Eof, pos)),
            Some('{') => {
                self.bump();
                Ok(Spanned::new(StmtToken::LBrace, pos))
            }
            Some('}') => {
                self.bump();
                Ok(Spanned::new(StmtToken::RBrace, pos))
            }
            Some(';') => {
                self.bump();
                Ok(Spanned::new(StmtToken::Semicolon, pos))
            }
            Some(q @ ('"' | '\'')) => {
                self.bump();
                let mut joined = self.lex_quoted(q)?;
                loop {
                    let save = self.chars.clone();
                    let (save_line, save_col) = (self.line, self.column);
                    self.skip_trivia();
                    if self.peek_char() == Some('+') {
                        self.bump();
                        self.skip_trivia();
                        match self.peek_char() {
                            Some(q2 @ ('"' | '\'')) => {
                                self.bump();
                                joined.push_str(&self.lex_quoted(q2)?);
                            }
                            _ => {
                                self.chars = save;
                                self.line = save_line;
                                self.column = save_col;
                                break;
                            }
                        }
                    } else {
                        self.chars = save;
                        self.line = save_line;
                        self.column = save_col;
                        break;
                    }
                }
                Ok(Spanned::new(StmtToken::Arg(joined), pos))
            }
            Some(_) => {
                let text = self.lex_unquoted();
                if text.is_empty() {
                    return Err(Error::fatal_at(
                        ErrorCode::WrongToken,
                        "unexpected character in YANG source",
                        pos,
                    ));
                }
                Ok(Spanned::new(StmtToken::Identifier(text), pos))
            }
        }
    }

    fn tokenize(mut self) -> Result<(Vec<Spanned<StmtToken>>, Position)> {
        let mut out = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_eof = matches!(tok.kind, StmtToken::Eof);
            let eof_pos = tok.pos.clone();
            out.push(tok);
            if is_eof {
                return Ok((out, eof_pos));
            }
        }
    }

    #[allow(dead_code)]
    fn source_len(&self) -> usize {
        self.src.len()
    }
}

fn split_keyword(raw: &str) -> (Option<String>, String) {
    match raw.split_once(':') {
        Some((prefix, local)) if !prefix.is_empty() && !local.is_empty() => {
            (Some(prefix.to_string()), local.to_string())
        }
        _ => (None, raw.to_string()),
    }
}

fn parse_stmt(chain: &mut TokenChain<StmtToken>) -> Result<Stmt> {
    let head = chain.advance();
    let pos = head.pos;
    let raw = match head.kind {
        StmtToken::Identifier(s) => s,
        other => {
            return Err(Error::fatal_at(
                ErrorCode::WrongToken,
                format!("expected a statement keyword, found {other:?}"),
                pos,
            ))
        }
    };
    let (prefix, keyword) = split_keyword(&raw);

    let argument = match &chain.peek().kind {
        StmtToken::Identifier(_) | StmtToken::Arg(_) => {
            let tok = chain.advance();
            Some(match tok.kind {
                StmtToken::Identifier(s) => s,
                StmtToken::Arg(s) => s,
                _ => unreachable!(),
            })
        }
        _ => None,
    };

    let mut substatements = Vec::new();
    match &chain.peek().kind {
        StmtToken::Semicolon => {
            chain.advance();
        }
        StmtToken::LBrace => {
            chain.advance();
            loop {
                match &chain.peek().kind {
                    StmtToken::RBrace => {
                        chain.advance();
                        break;
                    }
                    StmtToken::Eof => {
                        return Err(Error::fatal_at(
                            ErrorCode::WrongToken,
                            "unterminated statement block",
                            chain.current_source_position(),
                        ))
                    }
                    _ => substatements.push(parse_stmt(chain)?),
                }
            }
        }
        other => {
            return Err(Error::fatal_at(
                ErrorCode::WrongToken,
                format!("expected ';' or '{{', found {other:?}"),
                chain.current_source_position(),
            ))
        }
    }

    Ok(Stmt {
        prefix,
        keyword,
        argument,
        substatements,
        pos,
    })
}

/// Parses one YANG module/submodule source text into its top-level
/// statement (`module` or `submodule`).
pub fn parse_module_text(src: &str, module_hint: &str) -> Result<Stmt> {
    let lexer = Lexer::new(src, Some(module_hint.to_string()));
    let (tokens, eof_pos) = lexer.tokenize()?;
    let mut chain = TokenChain::new(tokens, StmtToken::Eof, eof_pos);
    if chain.at_eof() {
        return Err(Error::fatal(ErrorCode::WrongToken, "empty YANG source"));
    }
    let stmt = parse_stmt(&mut chain)?;
    if !chain.at_eof() {
        return Err(Error::fatal_at(
            ErrorCode::WrongToken,
            "trailing content after top-level statement",
            chain.current_source_position(),
        ));
    }
    Ok(stmt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_statements() {
        let src = r#"
            module m {
                namespace "urn:m";
                prefix m;
                container a {
                    leaf b {
                        type string;
                    }
                }
            }
        "#;
        let stmt = parse_module_text(src, "m").unwrap();
        assert_eq!(stmt.keyword, "module");
        assert_eq!(stmt.arg().unwrap(), "m");
        let container = stmt.child("container").unwrap();
        assert_eq!(container.arg().unwrap(), "a");
        let leaf = container.child("leaf").unwrap();
        assert_eq!(leaf.arg().unwrap(), "b");
        assert_eq!(leaf.child("type").unwrap().arg().unwrap(), "string");
    }

    #[test]
    fn joins_concatenated_strings() {
        let src = r#"module m { description "foo" + "bar"; }"#;
        let stmt = parse_module_text(src, "m").unwrap();
        assert_eq!(
            stmt.child("description").unwrap().arg().unwrap(),
            "foobar"
        );
    }

    #[test]
    fn rejects_unterminated_block() {
        let src = "module m { container a {";
        assert!(parse_module_text(src, "m").is_err());
    }
}
