/*
 * Copyright (c) 2026 the Wisp project contributors.
 *
 * This file is part of the Wisp intent engine.
 *
 * LICENSE: MIT
 */

//! Synchronous evaluator: a state machine over expression shape. The only
//! state threaded between calls is the environment chain; intent resolution
//! is delegated to the engine.

use crate::engine::Engine;
use crate::env::Env;
use crate::error::EngineError;
use crate::marshal;
use crate::reader::Expr;
use crate::value::{Closure, Value};
use std::cell::RefCell;
use std::rc::Rc;

pub fn eval(engine: &mut Engine, expr: &Expr, env: &Rc<RefCell<Env>>) -> Result<Value, EngineError> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Text(s) => Ok(Value::Text(s.clone())),
        Expr::Symbol(name) => {
            Env::get(env, name).ok_or_else(|| EngineError::UndefinedSymbol(name.clone()))
        }
        Expr::List(items) => eval_list(engine, items, env),
    }
}

fn eval_list(
    engine: &mut Engine,
    items: &[Expr],
    env: &Rc<RefCell<Env>>,
) -> Result<Value, EngineError> {
    let Some(head) = items.first() else {
        return Ok(Value::Nil);
    };

    if let Some(form) = head.as_symbol() {
        match form {
            "quote" => {
                return Ok(items.get(1).map(quote_value).unwrap_or(Value::Nil));
            }
            "if" => return eval_if(engine, items, env),
            "and" => {
                for operand in &items[1..] {
                    if !eval(engine, operand, env)?.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                }
                return Ok(Value::Bool(true));
            }
            "or" => {
                for operand in &items[1..] {
                    let v = eval(engine, operand, env)?;
                    if v.is_truthy() {
                        return Ok(v);
                    }
                }
                return Ok(Value::Bool(false));
            }
            "define" => return eval_define(engine, items, env),
            "lambda" => return make_closure(&items[1..], env),
            "let" => return eval_let(engine, items, env),
            "begin" => {
                let mut last = Value::Nil;
                for e in &items[1..] {
                    last = eval(engine, e, env)?;
                }
                return Ok(last);
            }
            "set!" => {
                let name = items
                    .get(1)
                    .and_then(Expr::as_symbol)
                    .ok_or_else(|| EngineError::InvalidOperation("set! expects a name".into()))?;
                let value = match items.get(2) {
                    Some(e) => eval(engine, e, env)?,
                    None => Value::Nil,
                };
                if !Env::assign(env, name, value.clone()) {
                    return Err(EngineError::UndefinedSymbol(name.to_string()));
                }
                return Ok(value);
            }
            "cond" => return eval_cond(engine, items, env),
            "intent" => {
                let operand = items.get(1).ok_or_else(|| {
                    EngineError::InvalidOperation("intent expects a text operand".into())
                })?;
                let text = match eval(engine, operand, env)? {
                    Value::Text(s) => s,
                    other => {
                        return Err(EngineError::InvalidOperation(format!(
                            "intent expects text, got {:?}",
                            other
                        )));
                    }
                };
                let cf = engine.resolve_intent(&text)?;
                return Ok(Value::Compiled(cf));
            }
            _ => {}
        }
    }

    // Application: evaluate the operator, then the operands left to right.
    let callee = eval(engine, head, env)?;
    let mut args = Vec::with_capacity(items.len() - 1);
    for operand in &items[1..] {
        args.push(eval(engine, operand, env)?);
    }
    apply(engine, &callee, args)
}

/// Apply any callable value. Closures bind parameters positionally; unmatched
/// parameters bind to nil and extra arguments are ignored.
pub fn apply(engine: &mut Engine, callee: &Value, args: Vec<Value>) -> Result<Value, EngineError> {
    match callee {
        Value::Closure(closure) => {
            let frame = Env::child(&closure.env);
            for (i, param) in closure.params.iter().enumerate() {
                let bound = args.get(i).cloned().unwrap_or(Value::Nil);
                Env::define(&frame, param, bound);
            }
            let mut last = Value::Nil;
            for form in &closure.body {
                last = eval(engine, form, &frame)?;
            }
            Ok(last)
        }
        Value::Native(_, f) => f(engine, args),
        Value::Compiled(cf) => marshal::invoke(engine, &Rc::clone(cf), &args),
        other => Err(EngineError::NotApplicable(other.clone())),
    }
}

fn eval_if(
    engine: &mut Engine,
    items: &[Expr],
    env: &Rc<RefCell<Env>>,
) -> Result<Value, EngineError> {
    let test = items
        .get(1)
        .ok_or_else(|| EngineError::InvalidOperation("if expects a test".into()))?;
    if eval(engine, test, env)?.is_truthy() {
        match items.get(2) {
            Some(then_branch) => eval(engine, then_branch, env),
            None => Ok(Value::Nil),
        }
    } else {
        match items.get(3) {
            Some(else_branch) => eval(engine, else_branch, env),
            None => Ok(Value::Nil),
        }
    }
}

fn eval_define(
    engine: &mut Engine,
    items: &[Expr],
    env: &Rc<RefCell<Env>>,
) -> Result<Value, EngineError> {
    match items.get(1) {
        // (define name expr)
        Some(Expr::Symbol(name)) => {
            let value = match items.get(2) {
                Some(e) => eval(engine, e, env)?,
                None => Value::Nil,
            };
            Env::define(env, name, value);
            Ok(Value::Nil)
        }
        // (define (name params...) body...) — sugar for a named lambda
        Some(Expr::List(header)) => {
            let name = header
                .first()
                .and_then(Expr::as_symbol)
                .ok_or_else(|| EngineError::InvalidOperation("define expects a name".into()))?;
            let params: Vec<String> = header[1..]
                .iter()
                .filter_map(Expr::as_symbol)
                .map(str::to_string)
                .collect();
            let closure = Closure {
                params,
                body: items[2..].to_vec(),
                env: Rc::clone(env),
            };
            Env::define(env, name, Value::Closure(Rc::new(closure)));
            Ok(Value::Nil)
        }
        _ => Err(EngineError::InvalidOperation(
            "define expects a name or a (name params...) header".into(),
        )),
    }
}

fn make_closure(rest: &[Expr], env: &Rc<RefCell<Env>>) -> Result<Value, EngineError> {
    let params = match rest.first() {
        Some(Expr::List(names)) => names
            .iter()
            .filter_map(Expr::as_symbol)
            .map(str::to_string)
            .collect(),
        _ => {
            return Err(EngineError::InvalidOperation(
                "lambda expects a parameter list".into(),
            ));
        }
    };
    Ok(Value::Closure(Rc::new(Closure {
        params,
        body: rest[1..].to_vec(),
        env: Rc::clone(env),
    })))
}

fn eval_let(
    engine: &mut Engine,
    items: &[Expr],
    env: &Rc<RefCell<Env>>,
) -> Result<Value, EngineError> {
    let bindings = match items.get(1) {
        Some(Expr::List(bs)) => bs,
        _ => {
            return Err(EngineError::InvalidOperation(
                "let expects a binding list".into(),
            ));
        }
    };

    // Every value is evaluated in the outer environment; the bindings are not
    // visible to each other.
    let mut evaluated = Vec::with_capacity(bindings.len());
    for binding in bindings {
        match binding {
            Expr::List(pair) => {
                let name = pair
                    .first()
                    .and_then(Expr::as_symbol)
                    .ok_or_else(|| {
                        EngineError::InvalidOperation("let binding expects a name".into())
                    })?
                    .to_string();
                let value = match pair.get(1) {
                    Some(e) => eval(engine, e, env)?,
                    None => Value::Nil,
                };
                evaluated.push((name, value));
            }
            _ => {
                return Err(EngineError::InvalidOperation(
                    "let binding must be a (name value) pair".into(),
                ));
            }
        }
    }

    let frame = Env::child(env);
    for (name, value) in evaluated {
        Env::define(&frame, &name, value);
    }
    let mut last = Value::Nil;
    for form in &items[2..] {
        last = eval(engine, form, &frame)?;
    }
    Ok(last)
}

fn eval_cond(
    engine: &mut Engine,
    items: &[Expr],
    env: &Rc<RefCell<Env>>,
) -> Result<Value, EngineError> {
    for clause in &items[1..] {
        let Expr::List(parts) = clause else {
            return Err(EngineError::InvalidOperation(
                "cond clause must be a list".into(),
            ));
        };
        let Some(test) = parts.first() else {
            continue;
        };
        let test_value = match test.as_symbol() {
            Some("else") => Some(Value::Bool(true)),
            _ => {
                let v = eval(engine, test, env)?;
                v.is_truthy().then_some(v)
            }
        };
        if let Some(mut last) = test_value {
            for form in &parts[1..] {
                last = eval(engine, form, env)?;
            }
            return Ok(last);
        }
    }
    Ok(Value::Nil)
}

/// Convert a quoted expression to a value. Symbols quote to text.
fn quote_value(expr: &Expr) -> Value {
    match expr {
        Expr::Number(n) => Value::Number(*n),
        Expr::Text(s) => Value::Text(s.clone()),
        Expr::Symbol(s) => Value::Text(s.clone()),
        Expr::List(items) => Value::List(items.iter().map(quote_value).collect()),
    }
}
