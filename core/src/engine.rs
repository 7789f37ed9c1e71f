/*
 * Copyright (c) 2026 the Wisp project contributors.
 *
 * This file is part of the Wisp intent engine.
 *
 * LICENSE: MIT
 */

//! The engine object: one wasmtime store, one shared linear memory, the
//! intent cache and the compiler-service handle. Everything that was ambient
//! state in earlier sketches lives here so tests can run engines side by
//! side.

use crate::arena::MemoryArena;
use crate::client::{CompilerService, HttpCompiler};
use crate::env::Env;
use crate::error::EngineError;
use crate::eval;
use crate::intent::{self, CompiledFunction};
use crate::intrinsics::PrimitiveRegistry;
use crate::marshal::{Convention, ElemType};
use crate::reader;
use crate::value::Value;
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, warn};
use wasmtime::{Engine as WasmEngine, Memory, MemoryType, Store};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub compiler_url: String,
    pub request_timeout_ms: u64,
    /// Initial size of the shared linear memory, in 64KiB pages.
    pub initial_pages: u32,
    pub heap_base: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            compiler_url: "http://127.0.0.1:7878".to_string(),
            request_timeout_ms: 30_000,
            initial_pages: 2,
            heap_base: crate::arena::DEFAULT_HEAP_BASE,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `WISP_COMPILER_URL` when set.
    pub fn from_env() -> Self {
        let mut config = EngineConfig::default();
        if let Ok(url) = std::env::var("WISP_COMPILER_URL") {
            if !url.is_empty() {
                config.compiler_url = url;
            }
        }
        config
    }
}

/// Counters accumulated over the engine's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub compilations: u64,
    pub cache_hits: u64,
    /// Compiler-reported time, summed across fresh compilations.
    pub compile_time_ms: u64,
}

/// Result of evaluating a program: the value of the last successful
/// top-level expression, plus everything printed along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalOutcome {
    pub value: Value,
    pub printed: Vec<String>,
}

pub struct Engine {
    wasm: WasmEngine,
    pub(crate) store: Store<()>,
    pub(crate) memory: Memory,
    pub(crate) arena: MemoryArena,
    cache: HashMap<String, Rc<CompiledFunction>>,
    stats: EngineStats,
    compiler: Box<dyn CompilerService>,
    globals: Rc<RefCell<Env>>,
    printed: Vec<String>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Engine, EngineError> {
        let compiler = HttpCompiler::new(
            &config.compiler_url,
            Duration::from_millis(config.request_timeout_ms),
        );
        Engine::with_compiler(config, Box::new(compiler))
    }

    /// Build an engine over an arbitrary compiler service; tests substitute
    /// in-memory mocks here.
    pub fn with_compiler(
        config: EngineConfig,
        compiler: Box<dyn CompilerService>,
    ) -> Result<Engine, EngineError> {
        let wasm = WasmEngine::default();
        let mut store = Store::new(&wasm, ());
        let memory = Memory::new(&mut store, MemoryType::new(config.initial_pages, None))
            .map_err(|e| EngineError::Instantiate(e.to_string()))?;
        let globals = Env::new();
        PrimitiveRegistry::install(&globals);
        Ok(Engine {
            wasm,
            store,
            memory,
            arena: MemoryArena::new(config.heap_base),
            cache: HashMap::new(),
            stats: EngineStats::default(),
            compiler,
            globals,
            printed: Vec::new(),
        })
    }

    /// Parse and evaluate a whole program. A syntax error rejects the
    /// program outright; a runtime error aborts only the top-level
    /// expression it occurred in, is reported in the printed output, and
    /// evaluation moves on. Bindings made before the failure stay in place.
    pub fn evaluate_program(&mut self, source: &str) -> Result<EvalOutcome, EngineError> {
        let program = reader::parse_program(source)?;
        self.printed.clear();
        let mut value = Value::Nil;
        for expr in &program {
            // Scratch memory lives for exactly one top-level expression.
            self.arena.reset();
            let env = Rc::clone(&self.globals);
            match eval::eval(self, expr, &env) {
                Ok(v) => value = v,
                Err(e) => self.print_line(format!("error: {}", e)),
            }
        }
        Ok(EvalOutcome {
            value,
            printed: std::mem::take(&mut self.printed),
        })
    }

    /// Resolve an intent to a compiled function, through the cache. The
    /// cache key is the verbatim intent text and entries never evict: a
    /// resolved intent stays callable for the life of the engine.
    pub fn resolve_intent(&mut self, intent: &str) -> Result<Rc<CompiledFunction>, EngineError> {
        if let Some(cf) = self.cache.get(intent) {
            self.stats.cache_hits += 1;
            debug!(intent, hash = %cf.hash, "intent cache hit");
            return Ok(Rc::clone(cf));
        }

        let resp = self.compiler.compile(intent)?;
        // Metadata is decorative; losing it degrades the calling convention,
        // never the call.
        let metadata = self.compiler.metadata(&resp.hash).unwrap_or_else(|e| {
            warn!(hash = %resp.hash, error = %e, "metadata unavailable");
            None
        });
        let bytes = self.compiler.binary(&resp.hash)?;
        let module =
            intent::instantiate(&mut self.store, &self.wasm, self.memory, &resp.hash, &bytes)?;

        let elem = ElemType::from_tokens(&intent::signature_tokens(&resp.signature));
        let convention =
            Convention::derive(&module.param_types, &module.result_types, metadata.as_ref());
        let cf = Rc::new(CompiledFunction {
            intent: intent.to_string(),
            hash: resp.hash,
            signature: resp.signature,
            size: resp.size,
            from_cache: resp.cached,
            entry: module.entry,
            entry_name: module.entry_name,
            param_types: module.param_types,
            result_types: module.result_types,
            elem,
            convention,
            memory: module.memory,
            heap_base: module.heap_base,
            metadata,
        });

        self.stats.compilations += 1;
        self.stats.compile_time_ms += resp.timing_ms;
        debug!(
            intent,
            hash = %cf.hash,
            entry = %cf.entry_name,
            timing_ms = resp.timing_ms,
            "intent resolved"
        );
        self.cache.insert(intent.to_string(), Rc::clone(&cf));
        Ok(cf)
    }

    pub fn print_line(&mut self, line: String) {
        self.printed.push(line);
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{
        double_module, heap_base_module, memory_only_module, MockCompiler, MOCK_HEAP_BASE,
    };

    fn engine_with(mock: MockCompiler) -> Engine {
        Engine::with_compiler(EngineConfig::default(), Box::new(mock)).unwrap()
    }

    fn double_mock() -> MockCompiler {
        let mut mock = MockCompiler::new();
        mock.register(
            "double the number",
            double_module(),
            "(param i64) (result i64)",
            None,
        );
        mock
    }

    #[test]
    fn test_resolution_caches_by_intent_text() {
        let mock = double_mock();
        let counts = Rc::clone(&mock.counts);
        let mut engine = engine_with(mock);

        let first = engine.resolve_intent("double the number").unwrap();
        assert_eq!(counts.borrow().compile, 1);
        assert_eq!(counts.borrow().binary, 1);

        let second = engine.resolve_intent("double the number").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert!(format!("{:?}", first).contains("double the number"));
        assert_eq!(counts.borrow().compile, 1);
        assert_eq!(engine.stats().compilations, 1);
        assert_eq!(engine.stats().cache_hits, 1);
    }

    #[test]
    fn test_intent_end_to_end() {
        let mut engine = engine_with(double_mock());
        let out = engine
            .evaluate_program("(define f (intent \"double the number\")) (f 21)")
            .unwrap();
        assert!(out.printed.is_empty());
        assert_eq!(out.value, Value::Number(42.0));
    }

    #[test]
    fn test_metadata_failure_is_nonfatal() {
        let mock = double_mock();
        let fail_metadata = Rc::clone(&mock.fail_metadata);
        let mut engine = engine_with(mock);
        fail_metadata.set(true);
        let cf = engine.resolve_intent("double the number").unwrap();
        assert!(cf.metadata.is_none());
    }

    #[test]
    fn test_compile_failure_is_not_cached() {
        let mock = double_mock();
        let counts = Rc::clone(&mock.counts);
        let fail_compile = Rc::clone(&mock.fail_compile);
        let mut engine = engine_with(mock);

        fail_compile.set(true);
        assert!(engine.resolve_intent("double the number").is_err());
        assert_eq!(engine.stats().compilations, 0);

        // A later attempt goes back to the compiler, not the cache.
        fail_compile.set(false);
        engine.resolve_intent("double the number").unwrap();
        assert_eq!(counts.borrow().compile, 2);
        assert_eq!(engine.stats().compilations, 1);
    }

    #[test]
    fn test_module_without_function_export() {
        let mut mock = MockCompiler::new();
        mock.register("just memory", memory_only_module(), "", None);
        let mut engine = engine_with(mock);
        let err = engine.resolve_intent("just memory").unwrap_err();
        assert!(matches!(err, EngineError::NoFunctionExport));
    }

    #[test]
    fn test_own_memory_and_heap_base_win() {
        let mut mock = MockCompiler::new();
        mock.register(
            "identity",
            heap_base_module(),
            "(param i64) (result i64)",
            None,
        );
        let mut engine = engine_with(mock);
        let cf = engine.resolve_intent("identity").unwrap();
        assert_eq!(cf.heap_base, MOCK_HEAP_BASE as u32);
        // The module's exported memory is preferred over the shared one.
        assert_ne!(
            cf.memory.data_ptr(&engine.store),
            engine.memory.data_ptr(&engine.store)
        );
    }

    #[test]
    fn test_runtime_error_reported_and_evaluation_continues() {
        let mut engine = engine_with(MockCompiler::new());
        let out = engine
            .evaluate_program("(+ 1 2) (intent \"no such thing\") (+ 3 4)")
            .unwrap();
        assert_eq!(out.value, Value::Number(7.0));
        assert!(out.printed.iter().any(|l| l.starts_with("error:")));
    }

    #[test]
    fn test_syntax_error_rejects_whole_program() {
        let mut engine = engine_with(MockCompiler::new());
        assert!(engine.evaluate_program("(+ 1 2").is_err());
    }
}
