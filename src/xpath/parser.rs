//
// Copyright (c) The yangtool Contributors
//
// SPDX-License-Identifier: MIT
//

//! Recursive-descent parser for the XPath 1.0 expression grammar.

use crate::error::{Error, ErrorCode, Result};
use crate::xpath::ast::*;
use crate::xpath::lexer::{tokenize, XPathChain, XPathToken};

const NODE_TYPE_NAMES: [&str; 4] = ["comment", "text", "node", "processing-instruction"];

fn is_node_type_name(s: &str) -> bool {
    NODE_TYPE_NAMES.contains(&s)
}

fn split_qname(s: &str) -> (Option<String>, String) {
    match s.split_once(':') {
        Some((p, l)) if !p.is_empty() && !l.is_empty() => (Some(p.to_string()), l.to_string()),
        _ => (None, s.to_string()),
    }
}

fn name_is(chain: &XPathChain, text: &str) -> bool {
    matches!(&chain.peek().kind, XPathToken::Name(s) if s == text)
}

struct Parser {
    chain: XPathChain,
}

impl Parser {
    fn err(&self, msg: impl Into<String>) -> Error {
        Error::fatal_at(ErrorCode::WrongToken, msg, self.chain.current_source_position())
    }

    fn expect(&mut self, kind: XPathToken, what: &str) -> Result<()> {
        if self.chain.peek().kind == kind {
            self.chain.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected {what}")))
        }
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while name_is(&self.chain, "or") {
            self.chain.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary {
                op: BinOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_eq()?;
        while name_is(&self.chain, "and") {
            self.chain.advance();
            let rhs = self.parse_eq()?;
            lhs = Expr::Binary {
                op: BinOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_eq(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_rel()?;
        loop {
            let op = match self.chain.peek().kind {
                XPathToken::Eq => BinOp::Eq,
                XPathToken::Ne => BinOp::Ne,
                _ => break,
            };
            self.chain.advance();
            let rhs = self.parse_rel()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_rel(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_add()?;
        loop {
            let op = match self.chain.peek().kind {
                XPathToken::Lt => BinOp::Lt,
                XPathToken::Gt => BinOp::Gt,
                XPathToken::Le => BinOp::Le,
                XPathToken::Ge => BinOp::Ge,
                _ => break,
            };
            self.chain.advance();
            let rhs = self.parse_add()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_add(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.chain.peek().kind {
                XPathToken::Plus => BinOp::Add,
                XPathToken::Minus => BinOp::Sub,
                _ => break,
            };
            self.chain.advance();
            let rhs = self.parse_mul()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = if self.chain.peek().kind == XPathToken::Star {
                BinOp::Mul
            } else if name_is(&self.chain, "div") {
                BinOp::Div
            } else if name_is(&self.chain, "mod") {
                BinOp::Mod
            } else {
                break;
            };
            self.chain.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let mut negate = false;
        while self.chain.peek().kind == XPathToken::Minus {
            self.chain.advance();
            negate = !negate;
        }
        let inner = self.parse_union()?;
        Ok(if negate {
            Expr::Negate(Box::new(inner))
        } else {
            inner
        })
    }

    fn parse_union(&mut self) -> Result<Expr> {
        let first = self.parse_path_expr()?;
        if self.chain.peek().kind != XPathToken::Pipe {
            return Ok(first);
        }
        let mut members = vec![first];
        while self.chain.peek().kind == XPathToken::Pipe {
            self.chain.advance();
            members.push(self.parse_path_expr()?);
        }
        Ok(Expr::Union(members))
    }

    fn is_step_start(&self) -> bool {
        matches!(
            self.chain.peek().kind,
            XPathToken::Dot
                | XPathToken::DotDot
                | XPathToken::At
                | XPathToken::Star
                | XPathToken::Name(_)
        )
    }

    fn parse_path_expr(&mut self) -> Result<Expr> {
        match self.chain.peek().kind.clone() {
            XPathToken::Slash | XPathToken::SlashSlash => {
                Ok(Expr::Path(self.parse_location_path()?))
            }
            XPathToken::Dot | XPathToken::DotDot | XPathToken::At | XPathToken::Star => {
                Ok(Expr::Path(self.parse_location_path()?))
            }
            XPathToken::Name(ref s) => {
                let is_call =
                    self.chain.peek2().kind == XPathToken::LParen && !is_node_type_name(s);
                if is_call {
                    self.parse_filter_expr()
                } else {
                    Ok(Expr::Path(self.parse_location_path()?))
                }
            }
            _ => self.parse_filter_expr(),
        }
    }

    fn parse_filter_expr(&mut self) -> Result<Expr> {
        let primary = self.parse_primary_expr()?;
        let mut predicates = Vec::new();
        while self.chain.peek().kind == XPathToken::LBracket {
            predicates.push(self.parse_predicate()?);
        }
        let tail = match self.chain.peek().kind {
            XPathToken::Slash | XPathToken::SlashSlash => {
                let descendant = self.chain.peek().kind == XPathToken::SlashSlash;
                self.chain.advance();
                let mut steps = Vec::new();
                self.parse_relative_steps(&mut steps)?;
                Some(FilterTail { descendant, steps })
            }
            _ => None,
        };
        if predicates.is_empty() && tail.is_none() {
            Ok(primary)
        } else {
            Ok(Expr::Filter {
                primary: Box::new(primary),
                predicates,
                tail,
            })
        }
    }

    fn parse_predicate(&mut self) -> Result<Expr> {
        self.expect(XPathToken::LBracket, "'['")?;
        let e = self.parse_expr()?;
        self.expect(XPathToken::RBracket, "']'")?;
        Ok(e)
    }

    fn parse_primary_expr(&mut self) -> Result<Expr> {
        match self.chain.peek().kind.clone() {
            XPathToken::VarRef(name) => {
                self.chain.advance();
                let (prefix, local) = split_qname(&name);
                Ok(Expr::VarRef(prefix, local))
            }
            XPathToken::LParen => {
                self.chain.advance();
                let e = self.parse_expr()?;
                self.expect(XPathToken::RParen, "')'")?;
                Ok(e)
            }
            XPathToken::Literal(s) => {
                self.chain.advance();
                Ok(Expr::Literal(s))
            }
            XPathToken::Number(n) => {
                self.chain.advance();
                Ok(Expr::Number(n))
            }
            XPathToken::Name(name) => {
                self.chain.advance();
                self.expect(XPathToken::LParen, "'(' after function name")?;
                let mut args = Vec::new();
                if self.chain.peek().kind != XPathToken::RParen {
                    args.push(self.parse_expr()?);
                    while self.chain.peek().kind == XPathToken::Comma {
                        self.chain.advance();
                        args.push(self.parse_expr()?);
                    }
                }
                self.expect(XPathToken::RParen, "')' to close function call")?;
                Ok(Expr::Call { name, args })
            }
            _ => Err(self.err("expected an expression")),
        }
    }

    fn parse_location_path(&mut self) -> Result<LocationPath> {
        let mut steps = Vec::new();
        let absolute = match self.chain.peek().kind {
            XPathToken::Slash => {
                self.chain.advance();
                if self.is_step_start() {
                    self.parse_relative_steps(&mut steps)?;
                }
                true
            }
            XPathToken::SlashSlash => {
                self.chain.advance();
                steps.push(Step {
                    axis: Axis::DescendantOrSelf,
                    test: NodeTest::Node,
                    predicates: Vec::new(),
                });
                self.parse_relative_steps(&mut steps)?;
                true
            }
            _ => {
                self.parse_relative_steps(&mut steps)?;
                false
            }
        };
        Ok(LocationPath { absolute, steps })
    }

    fn parse_relative_steps(&mut self, steps: &mut Vec<Step>) -> Result<()> {
        steps.push(self.parse_step()?);
        loop {
            match self.chain.peek().kind {
                XPathToken::Slash => {
                    self.chain.advance();
                    steps.push(self.parse_step()?);
                }
                XPathToken::SlashSlash => {
                    self.chain.advance();
                    steps.push(Step {
                        axis: Axis::DescendantOrSelf,
                        test: NodeTest::Node,
                        predicates: Vec::new(),
                    });
                    steps.push(self.parse_step()?);
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn parse_step(&mut self) -> Result<Step> {
        match self.chain.peek().kind {
            XPathToken::Dot => {
                self.chain.advance();
                return Ok(Step {
                    axis: Axis::SelfAxis,
                    test: NodeTest::Node,
                    predicates: Vec::new(),
                });
            }
            XPathToken::DotDot => {
                self.chain.advance();
                return Ok(Step {
                    axis: Axis::Parent,
                    test: NodeTest::Node,
                    predicates: Vec::new(),
                });
            }
            XPathToken::At => {
                self.chain.advance();
                let test = self.parse_node_test()?;
                let predicates = self.parse_predicates()?;
                return Ok(Step {
                    axis: Axis::Attribute,
                    test,
                    predicates,
                });
            }
            _ => {}
        }

        let axis = if let XPathToken::Name(ref s) = self.chain.peek().kind {
            if self.chain.peek2().kind == XPathToken::ColonColon {
                match Axis::from_name(s) {
                    Some(axis) => {
                        self.chain.advance();
                        self.chain.advance();
                        axis
                    }
                    None => return Err(self.err(format!("unknown axis '{s}'"))),
                }
            } else {
                Axis::Child
            }
        } else {
            Axis::Child
        };

        let test = self.parse_node_test()?;
        let predicates = self.parse_predicates()?;
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn parse_predicates(&mut self) -> Result<Vec<Expr>> {
        let mut out = Vec::new();
        while self.chain.peek().kind == XPathToken::LBracket {
            out.push(self.parse_predicate()?);
        }
        Ok(out)
    }

    fn parse_node_test(&mut self) -> Result<NodeTest> {
        match self.chain.peek().kind.clone() {
            XPathToken::Star => {
                self.chain.advance();
                Ok(NodeTest::Wildcard(None))
            }
            XPathToken::Name(s) => {
                self.chain.advance();
                if self.chain.peek().kind == XPathToken::LParen {
                    if !is_node_type_name(&s) {
                        return Err(
                            self.err(format!("'{s}(' is not a valid node test"))
                        );
                    }
                    self.chain.advance();
                    let literal = if let XPathToken::Literal(lit) = self.chain.peek().kind.clone()
                    {
                        self.chain.advance();
                        Some(lit)
                    } else {
                        None
                    };
                    self.expect(XPathToken::RParen, "')' to close node-type test")?;
                    return Ok(match s.as_str() {
                        "comment" => NodeTest::Comment,
                        "text" => NodeTest::Text,
                        "processing-instruction" => NodeTest::ProcessingInstruction(literal),
                        _ => NodeTest::Node,
                    });
                }
                if let Some(prefix) = s.strip_suffix(":*").map(str::to_string) {
                    return Ok(NodeTest::Wildcard(Some(prefix)));
                }
                let (prefix, local) = split_qname(&s);
                Ok(NodeTest::Name(prefix, local))
            }
            _ => Err(self.err("expected a node test")),
        }
    }
}

/// Parses one XPath 1.0 expression, erroring if trailing tokens remain.
pub fn parse(src: &str, module: Option<String>) -> Result<Expr> {
    let chain = tokenize(src, module)?;
    let mut parser = Parser { chain };
    let expr = parser.parse_expr()?;
    if !parser.chain.at_eof() {
        return Err(Error::fatal_at(
            ErrorCode::InvalidXpathExpr,
            "trailing content after XPath expression",
            parser.chain.current_source_position(),
        ));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_absolute_path() {
        let expr = parse("/a/b", None).unwrap();
        match expr {
            Expr::Path(p) => {
                assert!(p.absolute);
                assert_eq!(p.steps.len(), 2);
            }
            _ => panic!("expected a path"),
        }
    }

    #[test]
    fn parses_predicate_with_equality() {
        let expr = parse("/a/b[. = 2]", None).unwrap();
        let Expr::Path(p) = expr else { panic!("expected path") };
        assert_eq!(p.steps[1].predicates.len(), 1);
    }

    #[test]
    fn distinguishes_function_call_from_name_test() {
        let expr = parse("substring-before(a, b)", None).unwrap();
        assert!(matches!(expr, Expr::Call { .. }));
    }

    #[test]
    fn leading_double_slash_means_descendant_or_self_from_root() {
        let expr = parse("//b", None).unwrap();
        let Expr::Path(p) = expr else { panic!("expected path") };
        assert!(p.absolute);
        assert_eq!(p.steps.len(), 2);
        assert_eq!(p.steps[0].axis, Axis::DescendantOrSelf);
    }

    #[test]
    fn rejects_wrong_arity_is_still_a_parse_time_concern_for_syntax_only() {
        // Parsing never checks arity; that's the evaluator's job at call
        // time.
        assert!(parse("substring(\"abc\")", None).is_ok());
    }

    #[test]
    fn rejects_unknown_axis() {
        assert!(parse("bogus::foo", None).is_err());
    }

    #[test]
    fn parses_union_of_paths() {
        let expr = parse("/a/b | /a/b | //b", None).unwrap();
        assert!(matches!(expr, Expr::Union(members) if members.len() == 3));
    }
}
