//! Tokenizer for the formula expression language.

use crate::error::CalcError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

/// A token plus the byte offset it starts at, for error reporting.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Splits `src` into tokens. Identifiers are `[A-Za-z_][A-Za-z0-9_]*`;
/// numbers are decimal with optional fraction and exponent.
pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>, CalcError> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let offset = i;
        match bytes[i] {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
                continue;
            }
            b'+' => {
                i += 1;
                out.push(Spanned { token: Token::Plus, offset });
            }
            b'-' => {
                i += 1;
                out.push(Spanned { token: Token::Minus, offset });
            }
            b'*' => {
                i += 1;
                out.push(Spanned { token: Token::Star, offset });
            }
            b'/' => {
                i += 1;
                out.push(Spanned { token: Token::Slash, offset });
            }
            b'(' => {
                i += 1;
                out.push(Spanned { token: Token::LParen, offset });
            }
            b')' => {
                i += 1;
                out.push(Spanned { token: Token::RParen, offset });
            }
            b'0'..=b'9' => {
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if i < bytes.len() && bytes[i] == b'.' {
                    i += 1;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                // Exponent is only consumed when it is actually well formed,
                // so "2e" falls through and errors on the stray ident.
                if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                    let mut j = i + 1;
                    if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                        j += 1;
                    }
                    if j < bytes.len() && bytes[j].is_ascii_digit() {
                        i = j;
                        while i < bytes.len() && bytes[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text = &src[offset..i];
                let value: f64 = text.parse().map_err(|_| CalcError::UnsupportedSyntax {
                    offset,
                    detail: format!("invalid number literal '{text}'"),
                })?;
                out.push(Spanned {
                    token: Token::Number(value),
                    offset,
                });
            }
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => {
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                out.push(Spanned {
                    token: Token::Ident(src[offset..i].to_string()),
                    offset,
                });
            }
            _ => {
                let ch = src[offset..].chars().next().unwrap_or('?');
                return Err(CalcError::UnsupportedSyntax {
                    offset,
                    detail: format!("unexpected character '{ch}'"),
                });
            }
        }
    }

    Ok(out)
}
