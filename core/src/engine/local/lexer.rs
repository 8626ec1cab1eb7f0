//! Tokenizer for the rule language.
//!
//! Every token carries the byte offset where it starts, so parse errors can
//! point back into the source.

use std::fmt;

use crate::error::ParseError;


// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Integer(i64),
    Float(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semi,
    Dot,
    Pipe,
    Minus,
    /// `:=`
    Define,
    /// `?=`
    Query,
    Eq,
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Integer(i) => write!(f, "{}", i),
            Token::Float(x) => write!(f, "{:?}", x),
            Token::Str(s) => write!(f, "{:?}", s),
            Token::Ident(s) => f.write_str(s),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::LBracket => f.write_str("["),
            Token::RBracket => f.write_str("]"),
            Token::LBrace => f.write_str("{"),
            Token::RBrace => f.write_str("}"),
            Token::Comma => f.write_str(","),
            Token::Colon => f.write_str(":"),
            Token::Semi => f.write_str(";"),
            Token::Dot => f.write_str("."),
            Token::Pipe => f.write_str("|"),
            Token::Minus => f.write_str("-"),
            Token::Define => f.write_str(":="),
            Token::Query => f.write_str("?="),
            Token::Eq => f.write_str("="),
            Token::Neq => f.write_str("!="),
            Token::Lt => f.write_str("<"),
            Token::Leq => f.write_str("<="),
            Token::Gt => f.write_str(">"),
            Token::Geq => f.write_str(">="),
        }
    }
}

/// A token and the byte offset of its first character.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}


// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

/// Split `src` into tokens. `#` starts a comment running to end of line.
pub fn tokenize(src: &str) -> Result<Vec<Spanned>, ParseError> {
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        let next = chars.get(i + 1).map(|(_, c)| *c);

        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '#' {
            while i < chars.len() && chars[i].1 != '\n' {
                i += 1;
            }
            continue;
        }

        let (token, width) = match c {
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '[' => (Token::LBracket, 1),
            ']' => (Token::RBracket, 1),
            '{' => (Token::LBrace, 1),
            '}' => (Token::RBrace, 1),
            ',' => (Token::Comma, 1),
            ';' => (Token::Semi, 1),
            '.' => (Token::Dot, 1),
            '|' => (Token::Pipe, 1),
            '-' => (Token::Minus, 1),
            '=' => (Token::Eq, 1),
            ':' if next == Some('=') => (Token::Define, 2),
            ':' => (Token::Colon, 1),
            '?' | '!' if next == Some('=') => {
                let token = if c == '?' { Token::Query } else { Token::Neq };
                (token, 2)
            }
            '?' | '!' => {
                return Err(ParseError::InvalidTokenCharacter {
                    token: c.to_string(),
                    c: next.unwrap_or('\0'),
                    pos,
                })
            }
            '<' if next == Some('=') => (Token::Leq, 2),
            '<' => (Token::Lt, 1),
            '>' if next == Some('=') => (Token::Geq, 2),
            '>' => (Token::Gt, 1),
            '"' => {
                let (text, end) = lex_string(&chars, i)?;
                tokens.push(Spanned { token: Token::Str(text), pos });
                i = end;
                continue;
            }
            c if c.is_ascii_digit() => {
                let (token, end) = lex_number(src, &chars, i)?;
                tokens.push(Spanned { token, pos });
                i = end;
                continue;
            }
            c if is_ident_start(c) => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i].1) {
                    i += 1;
                }
                let name: String = chars[start..i].iter().map(|(_, c)| c).collect();
                tokens.push(Spanned { token: Token::Ident(name), pos });
                continue;
            }
            other => {
                return Err(ParseError::InvalidTokenCharacter {
                    token: String::new(),
                    c: other,
                    pos,
                })
            }
        };
        tokens.push(Spanned { token, pos });
        i += width;
    }

    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Lex a string literal starting at the opening quote `chars[start]`.
/// Returns the unescaped text and the index just past the closing quote.
fn lex_string(chars: &[(usize, char)], start: usize) -> Result<(String, usize), ParseError> {
    let open = chars[start].0;
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i].1 {
            '"' => return Ok((text, i + 1)),
            '\n' => {
                return Err(ParseError::InvalidTokenCharacter {
                    token: format!("\"{}", text),
                    c: '\n',
                    pos: chars[i].0,
                })
            }
            '\\' => {
                let escaped = match chars.get(i + 1).map(|(_, c)| *c) {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('"') => '"',
                    Some('\\') => '\\',
                    Some(other) => {
                        return Err(ParseError::InvalidTokenCharacter {
                            token: format!("\"{}\\", text),
                            c: other,
                            pos: chars[i].0,
                        })
                    }
                    None => break,
                };
                text.push(escaped);
                i += 2;
            }
            c => {
                text.push(c);
                i += 1;
            }
        }
    }
    Err(ParseError::InvalidTokenCharacter {
        token: format!("\"{}", text),
        c: '\0',
        pos: open,
    })
}

/// Lex an integer or float starting at `chars[start]`.
fn lex_number(src: &str, chars: &[(usize, char)], start: usize) -> Result<(Token, usize), ParseError> {
    let pos = chars[start].0;
    let mut i = start;
    while i < chars.len() && chars[i].1.is_ascii_digit() {
        i += 1;
    }
    let mut is_float = false;
    if i + 1 < chars.len() && chars[i].1 == '.' && chars[i + 1].1.is_ascii_digit() {
        is_float = true;
        i += 1;
        while i < chars.len() && chars[i].1.is_ascii_digit() {
            i += 1;
        }
    }
    if i < chars.len() && is_ident_char(chars[i].1) {
        return Err(ParseError::InvalidToken { pos });
    }
    let end = chars.get(i).map(|(p, _)| *p).unwrap_or(src.len());
    let text = &src[pos..end];
    let token = if is_float {
        text.parse::<f64>()
            .map(Token::Float)
            .map_err(|_| ParseError::InvalidToken { pos })?
    } else {
        text.parse::<i64>()
            .map(Token::Integer)
            .map_err(|_| ParseError::IntegerOverflow {
                token: text.to_string(),
                pos,
            })?
    };
    Ok((token, i))
}
