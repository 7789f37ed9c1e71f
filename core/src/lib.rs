/*
 * Copyright (c) 2026 the Wisp project contributors.
 *
 * This file is part of the Wisp intent engine.
 *
 * LICENSE: MIT
 */

pub mod arena;
pub mod client;
pub mod engine;
pub mod env;
pub mod error;
pub mod eval;
pub mod intent;
pub mod intrinsics;
pub mod marshal;
pub mod raster;
pub mod reader;
#[cfg(test)]
pub mod testutil;
pub mod value;

pub use engine::{Engine, EngineConfig, EngineStats, EvalOutcome};
pub use error::EngineError;
pub use value::Value;
