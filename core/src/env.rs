/*
 * Copyright (c) 2026 the Wisp project contributors.
 *
 * This file is part of the Wisp intent engine.
 *
 * LICENSE: MIT
 */

//! Lexically-scoped environments with parent chaining.
//!
//! Child environments are created by `let` and closure application and are
//! shared by every closure created inside them. No environment ever holds a
//! reference to a child, so the `Rc<RefCell<...>>` chain is acyclic.

use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub struct Env {
    vars: HashMap<String, Value>,
    parent: Option<Rc<RefCell<Env>>>,
}

impl Env {
    pub fn new() -> Rc<RefCell<Env>> {
        Rc::new(RefCell::new(Env {
            vars: HashMap::new(),
            parent: None,
        }))
    }

    pub fn child(parent: &Rc<RefCell<Env>>) -> Rc<RefCell<Env>> {
        Rc::new(RefCell::new(Env {
            vars: HashMap::new(),
            parent: Some(Rc::clone(parent)),
        }))
    }

    /// Look a name up, walking the parent chain.
    pub fn get(env: &Rc<RefCell<Env>>, name: &str) -> Option<Value> {
        let mut current = Rc::clone(env);
        loop {
            if let Some(v) = current.borrow().vars.get(name) {
                return Some(v.clone());
            }
            let parent = current.borrow().parent.clone();
            match parent {
                Some(p) => current = p,
                None => return None,
            }
        }
    }

    /// Bind a name in this frame, shadowing any outer binding.
    pub fn define(env: &Rc<RefCell<Env>>, name: &str, value: Value) {
        env.borrow_mut().vars.insert(name.to_string(), value);
    }

    /// Mutate the nearest enclosing binding of `name`. Returns false if the
    /// name is undefined anywhere in the chain.
    pub fn assign(env: &Rc<RefCell<Env>>, name: &str, value: Value) -> bool {
        let mut current = Rc::clone(env);
        loop {
            if current.borrow().vars.contains_key(name) {
                current.borrow_mut().vars.insert(name.to_string(), value);
                return true;
            }
            let parent = current.borrow().parent.clone();
            match parent {
                Some(p) => current = p,
                None => return false,
            }
        }
    }
}
