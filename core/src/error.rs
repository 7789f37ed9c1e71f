/*
 * Copyright (c) 2026 the Wisp project contributors.
 *
 * This file is part of the Wisp intent engine.
 *
 * LICENSE: MIT
 */

use crate::reader::SyntaxError;
use crate::value::Value;
use thiserror::Error;

/// Unified error type for the engine. Reader and evaluator errors abort the
/// current top-level expression only; compiler/fetch errors abort the current
/// intent resolution without caching a partial result.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("Undefined symbol: {0}")]
    UndefinedSymbol(String),

    #[error("Not applicable: {0:?} cannot be called as a function")]
    NotApplicable(Value),

    #[error("Compile failed for intent \"{intent}\": {message}")]
    Compile { intent: String, message: String },

    #[error("Binary fetch failed for hash {hash}: {message}")]
    BinaryFetch { hash: String, message: String },

    #[error("Module exposes no callable export")]
    NoFunctionExport,

    #[error("Module instantiation failed: {0}")]
    Instantiate(String),

    #[error("Marshalling error: {0}")]
    Marshal(String),

    #[error("Native call trapped: {0}")]
    Trap(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}
