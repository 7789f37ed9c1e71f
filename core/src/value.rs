/*
 * Copyright (c) 2026 the Wisp project contributors.
 *
 * This file is part of the Wisp intent engine.
 *
 * LICENSE: MIT
 */

//! Runtime values: an explicit tagged union dispatched by exhaustive match.

use crate::engine::Engine;
use crate::env::Env;
use crate::error::EngineError;
use crate::intent::CompiledFunction;
use crate::reader::{write_number, Expr};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A host primitive. Takes the engine so higher-order primitives can apply
/// callables and `print` can capture output.
pub type NativeFn = fn(&mut Engine, Vec<Value>) -> Result<Value, EngineError>;

/// A user function: parameter names, body forms, captured environment.
/// Immutable after creation.
pub struct Closure {
    pub params: Vec<String>,
    pub body: Vec<Expr>,
    pub env: Rc<RefCell<Env>>,
}

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Closure(Rc<Closure>),
    Native(&'static str, NativeFn),
    Compiled(Rc<CompiledFunction>),
}

impl Value {
    /// Nil, false, 0 and the empty string are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Text(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn as_number(&self) -> Result<f64, EngineError> {
        match self {
            Value::Number(n) => Ok(*n),
            _ => Err(EngineError::InvalidOperation(format!(
                "expected a number, got {:?}",
                self
            ))),
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a, _), Value::Native(b, _)) => a == b,
            (Value::Compiled(a), Value::Compiled(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write_number(f, *n),
            Value::Text(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Value::Closure(c) => write!(f, "#<closure:{}>", c.params.join(" ")),
            Value::Native(name, _) => write!(f, "#<primitive:{}>", name),
            Value::Compiled(cf) => write!(f, "#<compiled:\"{}\">", cf.intent),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other),
        }
    }
}
