//! Recursive-descent parser for formula sources.
//!
//! Grammar:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := factor (('*' | '/') factor)*
//! factor  := '-' factor | primary
//! primary := NUMBER | IDENT | '(' expr ')'
//! ```

use super::ast::{BinaryOp, Expr};
use super::lexer::{tokenize, Spanned, Token};
use crate::error::CalcError;

/// Parses a complete formula. Trailing tokens after a valid expression
/// are rejected.
pub(crate) fn parse(src: &str) -> Result<Expr, CalcError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end_offset: src.len(),
    };
    let expr = parser.expr()?;
    parser.expect_end()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end_offset: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn expr(&mut self) -> Result<Expr, CalcError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Subtract,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, CalcError> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Multiply,
                Some(Token::Slash) => BinaryOp::Divide,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.factor()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> Result<Expr, CalcError> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.pos += 1;
            return Ok(Expr::Negate(Box::new(self.factor()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, CalcError> {
        let Some(spanned) = self.tokens.get(self.pos).cloned() else {
            return Err(CalcError::UnsupportedSyntax {
                offset: self.end_offset,
                detail: "unexpected end of formula".to_string(),
            });
        };
        self.pos += 1;
        match spanned.token {
            Token::Number(value) => Ok(Expr::Number(value)),
            Token::Ident(name) => Ok(Expr::Variable(name)),
            Token::LParen => {
                let inner = self.expr()?;
                match self.tokens.get(self.pos) {
                    Some(Spanned {
                        token: Token::RParen,
                        ..
                    }) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    Some(other) => Err(CalcError::UnsupportedSyntax {
                        offset: other.offset,
                        detail: format!("expected ')', found {}", describe(&other.token)),
                    }),
                    None => Err(CalcError::UnsupportedSyntax {
                        offset: self.end_offset,
                        detail: "expected ')' before end of formula".to_string(),
                    }),
                }
            }
            token => Err(CalcError::UnsupportedSyntax {
                offset: spanned.offset,
                detail: format!("unexpected {}", describe(&token)),
            }),
        }
    }

    fn expect_end(&self) -> Result<(), CalcError> {
        match self.tokens.get(self.pos) {
            None => Ok(()),
            Some(spanned) => Err(CalcError::UnsupportedSyntax {
                offset: spanned.offset,
                detail: format!("unexpected trailing {}", describe(&spanned.token)),
            }),
        }
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(value) => format!("number {value}"),
        Token::Ident(name) => format!("identifier '{name}'"),
        Token::Plus => "'+'".to_string(),
        Token::Minus => "'-'".to_string(),
        Token::Star => "'*'".to_string(),
        Token::Slash => "'/'".to_string(),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::BTreeMap;

    fn eval(src: &str, pairs: &[(&str, f64)]) -> Result<f64, CalcError> {
        let bindings: BTreeMap<String, f64> =
            pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        parse(src)?.evaluate(&bindings)
    }

    #[rstest]
    #[case("1 + 2 * 3", 7.0)]
    #[case("(1 + 2) * 3", 9.0)]
    #[case("10 - 4 - 3", 3.0)]
    #[case("24 / 4 / 2", 3.0)]
    #[case("-3 + 5", 2.0)]
    #[case("--4", 4.0)]
    #[case("2 * -3", -6.0)]
    fn test_precedence_and_associativity(#[case] src: &str, #[case] expected: f64) {
        assert_eq!(eval(src, &[]).unwrap(), expected);
    }

    #[test]
    fn test_variables_resolve_through_bindings() {
        let value = eval("a + b / 2", &[("a", 10.0), ("b", 4.0)]).unwrap();
        assert_eq!(value, 12.0);
    }

    #[rstest]
    #[case("", "unexpected end of formula")]
    #[case("1 +", "unexpected end of formula")]
    #[case("(1 + 2", "expected ')'")]
    #[case("1 2", "unexpected trailing number 2")]
    #[case("* 3", "unexpected '*'")]
    fn test_malformed_sources_are_rejected(#[case] src: &str, #[case] fragment: &str) {
        let err = parse(src).unwrap_err();
        assert!(
            err.to_string().contains(fragment),
            "error '{err}' should mention '{fragment}'"
        );
    }

    #[test]
    fn test_error_offset_points_at_offending_token() {
        let err = parse("a + ) * b").unwrap_err();
        match err {
            CalcError::UnsupportedSyntax { offset, .. } => assert_eq!(offset, 4),
            other => panic!("unexpected error: {other}"),
        }
    }
}
