/*
 * Copyright (c) 2026 the Wisp project contributors.
 *
 * This file is part of the Wisp intent engine.
 *
 * LICENSE: MIT
 */

//! Shared test fixtures: host-function mocks wrapped as compiled functions,
//! hand-assembled WASM modules, and an in-memory compiler service.

use crate::client::{CompileResponse, CompilerService, SemanticMetadata};
use crate::engine::Engine;
use crate::error::EngineError;
use crate::intent::CompiledFunction;
use crate::marshal::{Convention, ElemType};
use sha2::{Digest, Sha256};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use wasm_encoder::{
    CodeSection, ConstExpr, ExportKind, ExportSection, Function, FunctionSection, GlobalSection,
    GlobalType, Instruction, MemorySection, MemoryType, Module, TypeSection,
};
use wasmtime::{Caller, Func, ValType};

/// Wrap a host `Func` as a resolved compiled function so the marshalling and
/// raster layers can be exercised without a compiler service.
pub fn mock_compiled(engine: &mut Engine, intent: &str, entry: Func) -> CompiledFunction {
    let ty = entry.ty(&engine.store);
    let param_types: Vec<ValType> = ty.params().collect();
    let result_types: Vec<ValType> = ty.results().collect();
    let signature = render_signature(&param_types, &result_types);
    // Host mocks traffic in i64 regions unless the type mentions f64; the
    // pointer-and-length i32 pairs say nothing about the element type.
    let elem = if param_types
        .iter()
        .chain(result_types.iter())
        .any(|t| matches!(t, ValType::F64))
    {
        ElemType::F64
    } else {
        ElemType::I64
    };
    let convention = Convention::derive(&param_types, &result_types, None);
    CompiledFunction {
        intent: intent.to_string(),
        hash: format!("mock-{}", intent),
        signature,
        size: 0,
        from_cache: false,
        entry,
        entry_name: intent.to_string(),
        param_types,
        result_types,
        elem,
        convention,
        memory: engine.memory,
        heap_base: crate::arena::DEFAULT_HEAP_BASE,
        metadata: None,
    }
}

fn render_signature(params: &[ValType], results: &[ValType]) -> String {
    let list = |tys: &[ValType]| {
        tys.iter()
            .map(|t| match t {
                ValType::I32 => "i32",
                ValType::I64 => "i64",
                ValType::F32 => "f32",
                ValType::F64 => "f64",
                _ => "ref",
            })
            .collect::<Vec<_>>()
            .join(" ")
    };
    match (params.is_empty(), results.is_empty()) {
        (true, true) => String::new(),
        (false, true) => format!("(param {})", list(params)),
        (true, false) => format!("(result {})", list(results)),
        (false, false) => format!("(param {}) (result {})", list(params), list(results)),
    }
}

/// A `(pointer, length)` host entry that insertion-sorts an i64 region in
/// place, standing in for a compiled in-place mutator.
pub fn sort_in_place_entry(engine: &mut Engine) -> Func {
    let mem = engine.memory;
    Func::wrap(
        &mut engine.store,
        move |mut caller: Caller<'_, ()>, ptr: i32, len: i32| {
            let data = mem.data_mut(&mut caller);
            let base = ptr as usize;
            let mut values: Vec<i64> = (0..len as usize)
                .map(|i| i64::from_le_bytes(data[base + i * 8..base + i * 8 + 8].try_into().unwrap()))
                .collect();
            values.sort_unstable();
            for (i, v) in values.iter().enumerate() {
                data[base + i * 8..base + i * 8 + 8].copy_from_slice(&v.to_le_bytes());
            }
        },
    )
}

// ---------------------------------------------------------------------------
// Hand-assembled modules
// ---------------------------------------------------------------------------

/// A self-contained module exporting `double (param i64) (result i64)`.
pub fn double_module() -> Vec<u8> {
    let mut module = Module::new();

    let mut types = TypeSection::new();
    types
        .ty()
        .function(vec![wasm_encoder::ValType::I64], vec![wasm_encoder::ValType::I64]);
    module.section(&types);

    let mut functions = FunctionSection::new();
    functions.function(0);
    module.section(&functions);

    let mut exports = ExportSection::new();
    exports.export("double", ExportKind::Func, 0);
    module.section(&exports);

    let mut codes = CodeSection::new();
    let mut body = Function::new(vec![]);
    body.instruction(&Instruction::LocalGet(0));
    body.instruction(&Instruction::I64Const(2));
    body.instruction(&Instruction::I64Mul);
    body.instruction(&Instruction::End);
    codes.function(&body);
    module.section(&codes);

    module.finish()
}

/// A module exporting only a memory: no callable entry point.
pub fn memory_only_module() -> Vec<u8> {
    let mut module = Module::new();

    let mut memories = MemorySection::new();
    memories.memory(MemoryType {
        minimum: 1,
        maximum: None,
        memory64: false,
        shared: false,
        page_size_log2: None,
    });
    module.section(&memories);

    let mut exports = ExportSection::new();
    exports.export("memory", ExportKind::Memory, 0);
    module.section(&exports);

    module.finish()
}

/// Heap base offset declared by [`heap_base_module`].
pub const MOCK_HEAP_BASE: i32 = 8192;

/// A module with its own exported memory, a `__heap_base` global, and a
/// trivial identity entry point.
pub fn heap_base_module() -> Vec<u8> {
    let mut module = Module::new();

    let mut types = TypeSection::new();
    types
        .ty()
        .function(vec![wasm_encoder::ValType::I64], vec![wasm_encoder::ValType::I64]);
    module.section(&types);

    let mut functions = FunctionSection::new();
    functions.function(0);
    module.section(&functions);

    let mut memories = MemorySection::new();
    memories.memory(MemoryType {
        minimum: 2,
        maximum: None,
        memory64: false,
        shared: false,
        page_size_log2: None,
    });
    module.section(&memories);

    let mut globals = GlobalSection::new();
    globals.global(
        GlobalType {
            val_type: wasm_encoder::ValType::I32,
            mutable: false,
            shared: false,
        },
        &ConstExpr::i32_const(MOCK_HEAP_BASE),
    );
    module.section(&globals);

    let mut exports = ExportSection::new();
    exports.export("identity", ExportKind::Func, 0);
    exports.export("memory", ExportKind::Memory, 0);
    exports.export("__heap_base", ExportKind::Global, 0);
    module.section(&exports);

    let mut codes = CodeSection::new();
    let mut body = Function::new(vec![]);
    body.instruction(&Instruction::LocalGet(0));
    body.instruction(&Instruction::End);
    codes.function(&body);
    module.section(&codes);

    module.finish()
}

// ---------------------------------------------------------------------------
// Mock compiler service
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct CallCounts {
    pub compile: u32,
    pub metadata: u32,
    pub binary: u32,
}

struct MockModule {
    bytes: Vec<u8>,
    signature: String,
    metadata: Option<SemanticMetadata>,
}

/// In-memory `CompilerService`: registered intents compile to canned modules,
/// with shared counters and failure toggles observable from outside the
/// boxed service.
pub struct MockCompiler {
    modules: HashMap<String, MockModule>,
    pub counts: Rc<RefCell<CallCounts>>,
    pub fail_compile: Rc<Cell<bool>>,
    pub fail_metadata: Rc<Cell<bool>>,
}

impl MockCompiler {
    pub fn new() -> Self {
        MockCompiler {
            modules: HashMap::new(),
            counts: Rc::new(RefCell::new(CallCounts::default())),
            fail_compile: Rc::new(Cell::new(false)),
            fail_metadata: Rc::new(Cell::new(false)),
        }
    }

    pub fn register(
        &mut self,
        intent: &str,
        bytes: Vec<u8>,
        signature: &str,
        metadata: Option<SemanticMetadata>,
    ) {
        self.modules.insert(
            intent.to_string(),
            MockModule {
                bytes,
                signature: signature.to_string(),
                metadata,
            },
        );
    }

    pub fn hash_of(intent: &str) -> String {
        hex::encode(Sha256::digest(intent.as_bytes()))
    }
}

impl CompilerService for MockCompiler {
    fn compile(&self, intent: &str) -> Result<CompileResponse, EngineError> {
        self.counts.borrow_mut().compile += 1;
        if self.fail_compile.get() {
            return Err(EngineError::Compile {
                intent: intent.to_string(),
                message: "mock compiler unavailable".to_string(),
            });
        }
        let module = self
            .modules
            .get(intent)
            .ok_or_else(|| EngineError::Compile {
                intent: intent.to_string(),
                message: "unknown intent".to_string(),
            })?;
        Ok(CompileResponse {
            hash: Self::hash_of(intent),
            expanded_intent: intent.to_string(),
            signature: module.signature.clone(),
            size: module.bytes.len() as u64,
            timing_ms: 5,
            cached: false,
        })
    }

    fn metadata(&self, hash: &str) -> Result<Option<SemanticMetadata>, EngineError> {
        self.counts.borrow_mut().metadata += 1;
        if self.fail_metadata.get() {
            return Err(EngineError::InvalidOperation(
                "mock metadata unavailable".to_string(),
            ));
        }
        Ok(self
            .modules
            .iter()
            .find(|(intent, _)| Self::hash_of(intent) == hash)
            .and_then(|(_, m)| m.metadata.clone()))
    }

    fn binary(&self, hash: &str) -> Result<Vec<u8>, EngineError> {
        self.counts.borrow_mut().binary += 1;
        self.modules
            .iter()
            .find(|(intent, _)| Self::hash_of(intent) == hash)
            .map(|(_, m)| m.bytes.clone())
            .ok_or_else(|| EngineError::BinaryFetch {
                hash: hash.to_string(),
                message: "unknown hash".to_string(),
            })
    }
}
