/*
 * Copyright (c) 2026 the Wisp project contributors.
 *
 * This file is part of the Wisp intent engine.
 *
 * LICENSE: MIT
 */

//! The compiler-service boundary: an intent string goes out, a content hash,
//! signature and WASM binary come back. Only the data shapes matter here;
//! `HttpCompiler` is the blocking `ureq` implementation.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::time::Duration;
use tracing::debug;

/// Successful `compile` payload.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompileResponse {
    pub hash: String,
    #[serde(default)]
    pub expanded_intent: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub timing_ms: u64,
    #[serde(default)]
    pub cached: bool,
}

/// Optional descriptive data about a compiled function, fetched best-effort
/// by hash. Absence is never an error.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SemanticMetadata {
    #[serde(default)]
    pub renderer: Option<String>,
    /// x-min, x-max, y-min, y-max for 2D domains.
    #[serde(default)]
    pub domain: Option<Vec<f64>>,
    /// Parameter roles, in declaration order.
    #[serde(default)]
    pub params: Option<Vec<String>>,
    #[serde(default)]
    pub mutates_in_place: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct MetadataResponse {
    metadata: SemanticMetadata,
}

/// What the engine needs from the external compiler. Implemented over HTTP
/// in production and by mocks in tests.
pub trait CompilerService {
    fn compile(&self, intent: &str) -> Result<CompileResponse, EngineError>;
    fn metadata(&self, hash: &str) -> Result<Option<SemanticMetadata>, EngineError>;
    fn binary(&self, hash: &str) -> Result<Vec<u8>, EngineError>;
}

/// Upper bound on a fetched binary; a compiled intent should be small.
const MAX_BINARY_BYTES: u64 = 64 * 1024 * 1024;

/// Blocking HTTP client for the compiler service. The agent timeout doubles
/// as the cancellation mechanism: an unresponsive service fails the request
/// after `timeout` instead of hanging the evaluation thread.
pub struct HttpCompiler {
    agent: ureq::Agent,
    base: String,
}

impl HttpCompiler {
    pub fn new(base: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        HttpCompiler {
            agent,
            base: base.trim_end_matches('/').to_string(),
        }
    }
}

impl CompilerService for HttpCompiler {
    fn compile(&self, intent: &str) -> Result<CompileResponse, EngineError> {
        let url = format!("{}/compile", self.base);
        debug!(intent, "requesting compile");
        let response = self
            .agent
            .post(&url)
            .send_json(serde_json::json!({ "intent": intent }))
            .map_err(|e| EngineError::Compile {
                intent: intent.to_string(),
                message: e.to_string(),
            })?;
        response
            .into_json::<CompileResponse>()
            .map_err(|e| EngineError::Compile {
                intent: intent.to_string(),
                message: format!("malformed compile response: {}", e),
            })
    }

    fn metadata(&self, hash: &str) -> Result<Option<SemanticMetadata>, EngineError> {
        let url = format!("{}/metadata/{}", self.base, hash);
        match self.agent.get(&url).call() {
            Ok(response) => Ok(response
                .into_json::<MetadataResponse>()
                .ok()
                .map(|m| m.metadata)),
            Err(ureq::Error::Status(_, _)) => Ok(None),
            Err(e) => Err(EngineError::InvalidOperation(format!(
                "metadata fetch failed: {}",
                e
            ))),
        }
    }

    fn binary(&self, hash: &str) -> Result<Vec<u8>, EngineError> {
        let url = format!("{}/binary/{}", self.base, hash);
        let response = match self.agent.get(&url).call() {
            Ok(r) => r,
            Err(ureq::Error::Status(404, _)) => {
                return Err(EngineError::BinaryFetch {
                    hash: hash.to_string(),
                    message: "unknown hash".to_string(),
                });
            }
            Err(e) => {
                return Err(EngineError::BinaryFetch {
                    hash: hash.to_string(),
                    message: e.to_string(),
                });
            }
        };
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_BINARY_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| EngineError::BinaryFetch {
                hash: hash.to_string(),
                message: e.to_string(),
            })?;
        Ok(bytes)
    }
}
