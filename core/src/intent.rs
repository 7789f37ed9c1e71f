/*
 * Copyright (c) 2026 the Wisp project contributors.
 *
 * This file is part of the Wisp intent engine.
 *
 * LICENSE: MIT
 */

//! Compiled intents: instantiation of fetched WASM modules, export
//! introspection, and the parsed-once signature descriptor.

use crate::error::EngineError;
use crate::marshal::{Convention, ElemType};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use wasmtime::{Engine as WasmEngine, Extern, Func, Instance, Linker, Memory, Module, Store, ValType};

pub use crate::client::SemanticMetadata;

/// A natural-language intent resolved into a callable native function.
/// Lives for the process lifetime; the cache never evicts.
pub struct CompiledFunction {
    pub intent: String,
    pub hash: String,
    /// The compiler-declared signature string, verbatim.
    pub signature: String,
    pub size: u64,
    /// True when the compiler reported serving this binary from its own cache.
    pub from_cache: bool,
    pub entry: Func,
    pub entry_name: String,
    /// Ground-truth parameter/result types from the instantiated export.
    pub param_types: Vec<ValType>,
    pub result_types: Vec<ValType>,
    /// Element type for arena regions, inferred once from the signature.
    pub elem: ElemType,
    /// Calling convention, derived once from signature shape and metadata.
    pub convention: Convention,
    /// The memory this function executes against: its own export when it has
    /// one, otherwise the engine's shared memory.
    pub memory: Memory,
    pub heap_base: u32,
    pub metadata: Option<SemanticMetadata>,
}

impl CompiledFunction {
    /// Whether a single-array call mutates its buffer in place. The source
    /// behavior assumed it always does; metadata can now opt out.
    pub fn mutates_in_place(&self) -> bool {
        self.metadata
            .as_ref()
            .and_then(|m| m.mutates_in_place)
            .unwrap_or(true)
    }
}

impl fmt::Debug for CompiledFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledFunction")
            .field("intent", &self.intent)
            .field("hash", &self.hash)
            .field("signature", &self.signature)
            .field("entry_name", &self.entry_name)
            .field("convention", &self.convention)
            .field("heap_base", &self.heap_base)
            .finish_non_exhaustive()
    }
}

/// Extract the wasm value-type tokens from a declared signature string, e.g.
/// `"(param i32 i32) (result i64)"` → `["i32", "i32", "i64"]`.
pub fn signature_tokens(signature: &str) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\b(i32|i64|f32|f64)\b").expect("type token pattern"));
    re.find_iter(signature)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Instantiate a fetched binary and introspect its exports.
///
/// Instantiation first offers the engine's shared memory as `env.memory`;
/// if that fails, it retries with no imports at all, which covers
/// self-contained modules. The first callable export in export order becomes
/// the entry point; an exported memory is preferred over the shared one; the
/// larger of `__heap_base`/`__data_end` becomes the heap base, with one
/// reserved page as the fallback.
pub(crate) fn instantiate(
    store: &mut Store<()>,
    wasm: &WasmEngine,
    shared_memory: Memory,
    hash: &str,
    bytes: &[u8],
) -> Result<IntrospectedModule, EngineError> {
    let module = Module::from_binary(wasm, bytes).map_err(|e| EngineError::BinaryFetch {
        hash: hash.to_string(),
        message: format!("unreadable binary: {}", e),
    })?;

    let instance = {
        let mut linker: Linker<()> = Linker::new(wasm);
        linker
            .define(&mut *store, "env", "memory", shared_memory)
            .map_err(|e| EngineError::Instantiate(e.to_string()))?;
        match linker.instantiate(&mut *store, &module) {
            Ok(instance) => instance,
            Err(_) => Instance::new(&mut *store, &module, &[])
                .map_err(|e| EngineError::Instantiate(e.to_string()))?,
        }
    };

    let exports: Vec<(String, Extern)> = instance
        .exports(&mut *store)
        .map(|e| {
            let name = e.name().to_string();
            (name, e.into_extern())
        })
        .collect();

    let mut entry: Option<(String, Func)> = None;
    let mut own_memory: Option<Memory> = None;
    for (name, ext) in &exports {
        match ext {
            Extern::Func(f) if entry.is_none() => entry = Some((name.clone(), *f)),
            Extern::Memory(m) if own_memory.is_none() => own_memory = Some(*m),
            _ => {}
        }
    }
    let (entry_name, entry) = entry.ok_or(EngineError::NoFunctionExport)?;

    let read_global = |name: &str, store: &mut Store<()>| -> Option<u32> {
        instance
            .get_global(&mut *store, name)
            .map(|g| g.get(&mut *store))
            .and_then(|v| v.i32())
            .map(|v| v as u32)
    };
    let heap_base = read_global("__heap_base", store)
        .into_iter()
        .chain(read_global("__data_end", store))
        .max()
        .unwrap_or(crate::arena::DEFAULT_HEAP_BASE);

    let func_type = entry.ty(&mut *store);
    Ok(IntrospectedModule {
        entry,
        entry_name,
        param_types: func_type.params().collect(),
        result_types: func_type.results().collect(),
        memory: own_memory.unwrap_or(shared_memory),
        heap_base,
    })
}

pub(crate) struct IntrospectedModule {
    pub entry: Func,
    pub entry_name: String,
    pub param_types: Vec<ValType>,
    pub result_types: Vec<ValType>,
    pub memory: Memory,
    pub heap_base: u32,
}
