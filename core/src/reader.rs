/*
 * Copyright (c) 2026 the Wisp project contributors.
 *
 * This file is part of the Wisp intent engine.
 *
 * LICENSE: MIT
 */

//! S-expression reader: tokenizer plus recursive-descent parser.
//!
//! Produces immutable `Expr` trees. An atom token is classified in order:
//! string literal, integer, float (contains `.`), symbol. Comments run from
//! `;` to end of line and are discarded.

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyntaxError {
    #[error("Unexpected end of input: missing ')'")]
    UnexpectedEof,

    #[error("Unmatched ')'")]
    UnmatchedClose,

    #[error("Unterminated string literal")]
    UnterminatedString,
}

/// An expression produced by the reader. Never mutated after parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Symbol(String),
    List(Vec<Expr>),
}

impl Expr {
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Expr::Symbol(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write_number(f, *n),
            Expr::Text(s) => write!(f, "\"{}\"", escape(s)),
            Expr::Symbol(s) => write!(f, "{}", s),
            Expr::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

pub(crate) fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{}", n)
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Str(String),
    Atom(String),
}

/// Scan source text into tokens. String literals support `\\`, `\"` and `\n`
/// escapes; `;` starts a comment that runs to end of line.
fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            ';' => {
                for nc in chars.by_ref() {
                    if nc == '\n' {
                        break;
                    }
                }
            }
            '"' => {
                let mut s = String::new();
                let mut closed = false;
                while let Some(nc) = chars.next() {
                    match nc {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some('n') => s.push('\n'),
                            Some('"') => s.push('"'),
                            Some('\\') => s.push('\\'),
                            Some(other) => s.push(other),
                            None => return Err(SyntaxError::UnterminatedString),
                        },
                        _ => s.push(nc),
                    }
                }
                if !closed {
                    return Err(SyntaxError::UnterminatedString);
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_whitespace() => {}
            _ => {
                let mut atom = String::new();
                atom.push(c);
                while let Some(&nc) = chars.peek() {
                    if nc.is_whitespace() || matches!(nc, '(' | ')' | '"' | ';') {
                        break;
                    }
                    atom.push(nc);
                    chars.next();
                }
                tokens.push(Token::Atom(atom));
            }
        }
    }

    Ok(tokens)
}

fn classify_atom(atom: &str) -> Expr {
    if let Ok(i) = atom.parse::<i64>() {
        return Expr::Number(i as f64);
    }
    if atom.contains('.') {
        if let Ok(fl) = atom.parse::<f64>() {
            return Expr::Number(fl);
        }
    }
    Expr::Symbol(atom.to_string())
}

fn parse_expr(tokens: &[Token], pos: &mut usize) -> Result<Expr, SyntaxError> {
    match tokens.get(*pos) {
        None => Err(SyntaxError::UnexpectedEof),
        Some(Token::RParen) => Err(SyntaxError::UnmatchedClose),
        Some(Token::LParen) => {
            *pos += 1;
            let mut items = Vec::new();
            loop {
                match tokens.get(*pos) {
                    None => return Err(SyntaxError::UnexpectedEof),
                    Some(Token::RParen) => {
                        *pos += 1;
                        return Ok(Expr::List(items));
                    }
                    Some(_) => items.push(parse_expr(tokens, pos)?),
                }
            }
        }
        Some(Token::Str(s)) => {
            *pos += 1;
            Ok(Expr::Text(s.clone()))
        }
        Some(Token::Atom(a)) => {
            *pos += 1;
            Ok(classify_atom(a))
        }
    }
}

/// Parse a whole program into its ordered top-level expressions.
pub fn parse_program(source: &str) -> Result<Vec<Expr>, SyntaxError> {
    let tokens = tokenize(source)?;
    let mut exprs = Vec::new();
    let mut pos = 0;
    while pos < tokens.len() {
        exprs.push(parse_expr(&tokens, &mut pos)?);
    }
    Ok(exprs)
}

/// Parse exactly one expression.
pub fn parse_one(source: &str) -> Result<Expr, SyntaxError> {
    let tokens = tokenize(source)?;
    let mut pos = 0;
    let expr = parse_expr(&tokens, &mut pos)?;
    Ok(expr)
}
