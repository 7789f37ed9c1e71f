/*
 * Copyright (c) 2026 the Wisp project contributors.
 *
 * This file is part of the Wisp intent engine.
 *
 * LICENSE: MIT
 */

//! The primitive library. Primitives are plain functions behind a match-based
//! registry; `install` binds all of them into the root environment.
//!
//! `map`/`filter`/`reduce` accept any applicable value (closure, primitive,
//! or compiled function) uniformly.

use crate::engine::Engine;
use crate::env::Env;
use crate::error::EngineError;
use crate::eval;
use crate::raster::{self, RasterParams};
use crate::value::{NativeFn, Value};
use std::cell::RefCell;
use std::rc::Rc;

pub struct PrimitiveRegistry;

const NAMES: &[&str] = &[
    "+", "-", "*", "/", "=", "<", ">", "<=", ">=", "not", "abs", "min", "max", "print", "list",
    "length", "nth", "reverse", "append", "range", "map", "filter", "reduce", "render",
];

impl PrimitiveRegistry {
    pub fn resolve(name: &str) -> Option<NativeFn> {
        match name {
            "+" => Some(prim_add),
            "-" => Some(prim_sub),
            "*" => Some(prim_mul),
            "/" => Some(prim_div),
            "=" => Some(prim_eq),
            "<" => Some(prim_lt),
            ">" => Some(prim_gt),
            "<=" => Some(prim_le),
            ">=" => Some(prim_ge),
            "not" => Some(prim_not),
            "abs" => Some(prim_abs),
            "min" => Some(prim_min),
            "max" => Some(prim_max),
            "print" => Some(prim_print),
            "list" => Some(prim_list),
            "length" => Some(prim_length),
            "nth" => Some(prim_nth),
            "reverse" => Some(prim_reverse),
            "append" => Some(prim_append),
            "range" => Some(prim_range),
            "map" => Some(prim_map),
            "filter" => Some(prim_filter),
            "reduce" => Some(prim_reduce),
            "render" => Some(prim_render),
            _ => None,
        }
    }

    /// Bind every primitive into the given (root) environment.
    pub fn install(env: &Rc<RefCell<Env>>) {
        for name in NAMES {
            if let Some(f) = Self::resolve(name) {
                Env::define(env, name, Value::Native(name, f));
            }
        }
        Env::define(env, "nil", Value::Nil);
        Env::define(env, "true", Value::Bool(true));
        Env::define(env, "false", Value::Bool(false));
    }
}

fn numbers(args: &[Value]) -> Result<Vec<f64>, EngineError> {
    args.iter().map(Value::as_number).collect()
}

fn prim_add(_: &mut Engine, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Number(numbers(&args)?.iter().sum()))
}

fn prim_mul(_: &mut Engine, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Number(numbers(&args)?.iter().product()))
}

/// Unary negation with one argument, binary subtraction with two.
fn prim_sub(_: &mut Engine, args: Vec<Value>) -> Result<Value, EngineError> {
    let ns = numbers(&args)?;
    match ns.as_slice() {
        [x] => Ok(Value::Number(-x)),
        [a, b] => Ok(Value::Number(a - b)),
        _ => Err(EngineError::InvalidOperation(
            "- expects 1 or 2 arguments".into(),
        )),
    }
}

fn prim_div(_: &mut Engine, args: Vec<Value>) -> Result<Value, EngineError> {
    let ns = numbers(&args)?;
    match ns.as_slice() {
        [a, b] => Ok(Value::Number(a / b)),
        _ => Err(EngineError::InvalidOperation("/ expects 2 arguments".into())),
    }
}

fn prim_eq(_: &mut Engine, args: Vec<Value>) -> Result<Value, EngineError> {
    match args.as_slice() {
        [a, b] => Ok(Value::Bool(a == b)),
        _ => Err(EngineError::InvalidOperation("= expects 2 arguments".into())),
    }
}

fn compare(args: &[Value], op: fn(f64, f64) -> bool, name: &str) -> Result<Value, EngineError> {
    let ns = numbers(args)?;
    match ns.as_slice() {
        [a, b] => Ok(Value::Bool(op(*a, *b))),
        _ => Err(EngineError::InvalidOperation(format!(
            "{} expects 2 arguments",
            name
        ))),
    }
}

fn prim_lt(_: &mut Engine, args: Vec<Value>) -> Result<Value, EngineError> {
    compare(&args, |a, b| a < b, "<")
}

fn prim_gt(_: &mut Engine, args: Vec<Value>) -> Result<Value, EngineError> {
    compare(&args, |a, b| a > b, ">")
}

fn prim_le(_: &mut Engine, args: Vec<Value>) -> Result<Value, EngineError> {
    compare(&args, |a, b| a <= b, "<=")
}

fn prim_ge(_: &mut Engine, args: Vec<Value>) -> Result<Value, EngineError> {
    compare(&args, |a, b| a >= b, ">=")
}

fn prim_not(_: &mut Engine, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Bool(!args.first().is_some_and(Value::is_truthy)))
}

fn prim_abs(_: &mut Engine, args: Vec<Value>) -> Result<Value, EngineError> {
    match args.as_slice() {
        [v] => Ok(Value::Number(v.as_number()?.abs())),
        _ => Err(EngineError::InvalidOperation(
            "abs expects 1 argument".into(),
        )),
    }
}

fn prim_min(_: &mut Engine, args: Vec<Value>) -> Result<Value, EngineError> {
    let ns = numbers(&args)?;
    ns.iter()
        .copied()
        .reduce(f64::min)
        .map(Value::Number)
        .ok_or_else(|| EngineError::InvalidOperation("min expects at least 1 argument".into()))
}

fn prim_max(_: &mut Engine, args: Vec<Value>) -> Result<Value, EngineError> {
    let ns = numbers(&args)?;
    ns.iter()
        .copied()
        .reduce(f64::max)
        .map(Value::Number)
        .ok_or_else(|| EngineError::InvalidOperation("max expects at least 1 argument".into()))
}

fn prim_print(engine: &mut Engine, args: Vec<Value>) -> Result<Value, EngineError> {
    let line = args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    engine.print_line(line);
    Ok(Value::Nil)
}

fn prim_list(_: &mut Engine, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::List(args))
}

fn prim_length(_: &mut Engine, args: Vec<Value>) -> Result<Value, EngineError> {
    match args.as_slice() {
        [Value::List(items)] => Ok(Value::Number(items.len() as f64)),
        [Value::Text(s)] => Ok(Value::Number(s.chars().count() as f64)),
        _ => Err(EngineError::InvalidOperation(
            "length expects a list or text".into(),
        )),
    }
}

fn prim_nth(_: &mut Engine, args: Vec<Value>) -> Result<Value, EngineError> {
    match args.as_slice() {
        [Value::List(items), idx] => {
            let i = idx.as_number()? as usize;
            Ok(items.get(i).cloned().unwrap_or(Value::Nil))
        }
        _ => Err(EngineError::InvalidOperation(
            "nth expects a list and an index".into(),
        )),
    }
}

fn prim_reverse(_: &mut Engine, args: Vec<Value>) -> Result<Value, EngineError> {
    match args.as_slice() {
        [Value::List(items)] => Ok(Value::List(items.iter().rev().cloned().collect())),
        _ => Err(EngineError::InvalidOperation("reverse expects a list".into())),
    }
}

fn prim_append(_: &mut Engine, args: Vec<Value>) -> Result<Value, EngineError> {
    let mut out = Vec::new();
    for arg in &args {
        match arg.as_list() {
            Some(items) => out.extend_from_slice(items),
            None => {
                return Err(EngineError::InvalidOperation(
                    "append expects lists".into(),
                ));
            }
        }
    }
    Ok(Value::List(out))
}

/// (range end), (range start end) or (range start end step).
fn prim_range(_: &mut Engine, args: Vec<Value>) -> Result<Value, EngineError> {
    let ns = numbers(&args)?;
    let (start, end, step) = match ns.as_slice() {
        [end] => (0.0, *end, 1.0),
        [start, end] => (*start, *end, 1.0),
        [start, end, step] => (*start, *end, *step),
        _ => {
            return Err(EngineError::InvalidOperation(
                "range expects 1, 2 or 3 arguments".into(),
            ));
        }
    };
    if step == 0.0 {
        return Err(EngineError::InvalidOperation("range step must be nonzero".into()));
    }
    let mut out = Vec::new();
    let mut v = start;
    while (step > 0.0 && v < end) || (step < 0.0 && v > end) {
        out.push(Value::Number(v));
        v += step;
    }
    Ok(Value::List(out))
}

fn prim_map(engine: &mut Engine, args: Vec<Value>) -> Result<Value, EngineError> {
    match args.as_slice() {
        [f, Value::List(items)] => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval::apply(engine, f, vec![item.clone()])?);
            }
            Ok(Value::List(out))
        }
        _ => Err(EngineError::InvalidOperation(
            "map expects a callable and a list".into(),
        )),
    }
}

fn prim_filter(engine: &mut Engine, args: Vec<Value>) -> Result<Value, EngineError> {
    match args.as_slice() {
        [f, Value::List(items)] => {
            let mut out = Vec::new();
            for item in items {
                if eval::apply(engine, f, vec![item.clone()])?.is_truthy() {
                    out.push(item.clone());
                }
            }
            Ok(Value::List(out))
        }
        _ => Err(EngineError::InvalidOperation(
            "filter expects a callable and a list".into(),
        )),
    }
}

/// (reduce f init list) — left fold with (f acc item).
fn prim_reduce(engine: &mut Engine, args: Vec<Value>) -> Result<Value, EngineError> {
    match args.as_slice() {
        [f, init, Value::List(items)] => {
            let mut acc = init.clone();
            for item in items {
                acc = eval::apply(engine, f, vec![acc, item.clone()])?;
            }
            Ok(acc)
        }
        _ => Err(EngineError::InvalidOperation(
            "reduce expects a callable, an initial value and a list".into(),
        )),
    }
}

/// (render f width height x-min x-max y-min y-max max-iter) — raster a 2D
/// compiled function into RGBA bytes.
fn prim_render(engine: &mut Engine, args: Vec<Value>) -> Result<Value, EngineError> {
    let cf = match args.first() {
        Some(Value::Compiled(cf)) => Rc::clone(cf),
        _ => {
            return Err(EngineError::InvalidOperation(
                "render expects a compiled function".into(),
            ));
        }
    };
    let ns = numbers(&args[1..])?;
    let params = match ns.as_slice() {
        [w, h, x0, x1, y0, y1, iter] => RasterParams {
            width: *w as u32,
            height: *h as u32,
            x_min: *x0,
            x_max: *x1,
            y_min: *y0,
            y_max: *y1,
            max_iter: *iter as u32,
        },
        _ => {
            return Err(EngineError::InvalidOperation(
                "render expects width height x-min x-max y-min y-max max-iter".into(),
            ));
        }
    };
    let pixels = raster::render(engine, &cf, &params)?;
    Ok(Value::List(
        pixels.iter().map(|b| Value::Number(*b as f64)).collect(),
    ))
}
