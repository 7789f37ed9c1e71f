/*
 * Copyright (c) 2026 the Wisp project contributors.
 *
 * This file is part of the Wisp intent engine.
 *
 * LICENSE: MIT
 */

//! Raster fast path for 2D grid-producing functions.
//!
//! Eligible functions fill a whole `width*height` buffer of i32 iteration
//! counts in one call: `(pointer, width, height, x-min, x-max, y-min, y-max,
//! iteration-limit)`. Everything else falls back to one call per output
//! cell. Both paths feed the same colormap step and must produce
//! pixel-identical output for the same function, domain and resolution.

use crate::engine::Engine;
use crate::error::EngineError;
use crate::intent::CompiledFunction;
use crate::marshal::{self, Convention, ElemType};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterParams {
    pub width: u32,
    pub height: u32,
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub max_iter: u32,
}

/// Domain coordinate of the center of cell `i` out of `n`.
pub fn cell_coord(i: u32, n: u32, min: f64, max: f64) -> f64 {
    min + (i as f64 + 0.5) * (max - min) / n as f64
}

/// Render a compiled function over a 2D domain into RGBA pixels, row-major.
pub fn render(
    engine: &mut Engine,
    cf: &CompiledFunction,
    p: &RasterParams,
) -> Result<Vec<u8>, EngineError> {
    if p.width == 0 || p.height == 0 {
        return Ok(Vec::new());
    }
    let counts = if cf.convention == Convention::RasterFill {
        fill_buffer(engine, cf, p)?
    } else {
        per_cell(engine, cf, p)?
    };
    let mut pixels = Vec::with_capacity(counts.len() * 4);
    for count in counts {
        pixels.extend_from_slice(&colormap(count, p.max_iter));
    }
    Ok(pixels)
}

/// One native call populates the whole output grid.
fn fill_buffer(
    engine: &mut Engine,
    cf: &CompiledFunction,
    p: &RasterParams,
) -> Result<Vec<u32>, EngineError> {
    engine.arena.rebase(cf.heap_base);
    let cells = (p.width as usize) * (p.height as usize);
    let zeros = vec![0.0; cells];
    // Iteration counts are always an i32 grid, whatever the coordinate types.
    let (ptr, len) = engine
        .arena
        .alloc(&mut engine.store, cf.memory, ElemType::I32, &zeros)?;
    let raw = [
        ptr as f64,
        p.width as f64,
        p.height as f64,
        p.x_min,
        p.x_max,
        p.y_min,
        p.y_max,
        p.max_iter as f64,
    ];
    marshal::call_entry(&mut engine.store, cf, &raw)?;
    let counts = marshal::read_back(&engine.store, cf.memory, ElemType::I32, ptr, len);
    Ok(counts.into_iter().map(|c| c as u32).collect())
}

/// Fallback: one native call per output cell.
fn per_cell(
    engine: &mut Engine,
    cf: &CompiledFunction,
    p: &RasterParams,
) -> Result<Vec<u32>, EngineError> {
    let mut counts = Vec::with_capacity((p.width as usize) * (p.height as usize));
    for yi in 0..p.height {
        let y = cell_coord(yi, p.height, p.y_min, p.y_max);
        for xi in 0..p.width {
            let x = cell_coord(xi, p.width, p.x_min, p.x_max);
            let ret = marshal::call_entry(&mut engine.store, cf, &[x, y, p.max_iter as f64])?;
            counts.push(ret.unwrap_or(0.0) as u32);
        }
    }
    Ok(counts)
}

/// Map an iteration count to an RGBA pixel. Shared by both raster paths.
fn colormap(count: u32, max_iter: u32) -> [u8; 4] {
    if count >= max_iter {
        return [0, 0, 0, 255];
    }
    let t = count as f64 / max_iter.max(1) as f64;
    [
        (255.0 * t) as u8,
        (255.0 * t * t) as u8,
        (255.0 * t.sqrt()) as u8,
        255,
    ]
}
