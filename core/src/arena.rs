/*
 * Copyright (c) 2026 the Wisp project contributors.
 *
 * This file is part of the Wisp intent engine.
 *
 * LICENSE: MIT
 */

//! Bump-allocated scratch memory over a wasmtime linear memory.
//!
//! The cursor resets to the heap base exactly once per top-level evaluation,
//! never mid-expression. Growth is by whole 64KiB pages, and byte views are
//! taken only after any growth: growing may hand back a new backing buffer,
//! invalidating every view obtained before it.

use crate::error::EngineError;
use crate::marshal::ElemType;
use wasmtime::{Memory, Store};

pub const PAGE_SIZE: u32 = 65536;

/// First safe offset when a module declares no `__heap_base`/`__data_end`:
/// the whole first page is reserved for the module's static data.
pub const DEFAULT_HEAP_BASE: u32 = PAGE_SIZE;

pub struct MemoryArena {
    cursor: u32,
    heap_base: u32,
}

impl MemoryArena {
    pub fn new(heap_base: u32) -> Self {
        MemoryArena {
            cursor: heap_base,
            heap_base,
        }
    }

    /// Reset the cursor to the heap base. Previously materialized host-side
    /// results are plain copies, so a reset never corrupts returned values.
    pub fn reset(&mut self) {
        self.cursor = self.heap_base;
    }

    /// Never allocate below `base`: used when a callee's own memory declares
    /// a higher heap base than the cursor currently sits at.
    pub fn rebase(&mut self, base: u32) {
        if self.cursor < base {
            self.cursor = base;
        }
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Write `values` into `memory` as `elem`-typed elements and return the
    /// `(pointer, length)` pair describing the region.
    pub fn alloc(
        &mut self,
        store: &mut Store<()>,
        memory: Memory,
        elem: ElemType,
        values: &[f64],
    ) -> Result<(u32, u32), EngineError> {
        let width = elem.width();

        // Align the cursor up to 8 bytes.
        self.cursor = (self.cursor + 7) & !7;
        let ptr = self.cursor;

        let end = ptr as u64 + values.len() as u64 * width as u64;
        let capacity = memory.data_size(&mut *store) as u64;
        if end > capacity {
            let deficit = end - capacity;
            let pages = deficit.div_ceil(PAGE_SIZE as u64);
            memory
                .grow(&mut *store, pages)
                .map_err(|e| EngineError::Marshal(format!("memory grow failed: {}", e)))?;
        }

        // Fresh view only after any growth.
        let data = memory.data_mut(&mut *store);
        for (i, v) in values.iter().enumerate() {
            let at = ptr as usize + i * width as usize;
            elem.write(&mut data[at..at + width as usize], *v);
        }

        self.cursor = end as u32;
        Ok((ptr, values.len() as u32))
    }
}
