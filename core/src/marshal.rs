/*
 * Copyright (c) 2026 the Wisp project contributors.
 *
 * This file is part of the Wisp intent engine.
 *
 * LICENSE: MIT
 */

//! Calling-convention layer: lowers Lisp values into arena memory, invokes a
//! compiled entry point, and reads results back through a typed view.
//!
//! Dispatch follows a fixed priority order over argument shapes:
//!   1. no array argument      → direct scalar call
//!   2. a single array         → (pointer, length), read the region back
//!   3. array plus one scalar  → (pointer, length, scalar), scalar result
//!   4. anything else          → flatten every argument positionally
//!
//! The per-function `Convention` tag, derived once at resolution time,
//! refines case 2: a function whose metadata declares it does not mutate its
//! buffer returns its own scalar result instead of the region.

use crate::engine::Engine;
use crate::error::EngineError;
use crate::intent::{CompiledFunction, SemanticMetadata};
use crate::value::Value;
use wasmtime::{Memory, Store, Val, ValType};

/// Element type of an arena region, inferred once from the compiled
/// function's declared signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElemType {
    F64,
    I32,
    I64,
}

impl ElemType {
    /// Heuristic over the declared type tokens: any `f64` means 64-bit float,
    /// `i32` without `i64` means 32-bit integer, anything else defaults to
    /// 64-bit integer.
    pub fn from_tokens(tokens: &[String]) -> ElemType {
        if tokens.iter().any(|t| t == "f64") {
            ElemType::F64
        } else if tokens.iter().any(|t| t == "i32") && !tokens.iter().any(|t| t == "i64") {
            ElemType::I32
        } else {
            ElemType::I64
        }
    }

    pub fn width(self) -> u32 {
        match self {
            ElemType::I32 => 4,
            ElemType::F64 | ElemType::I64 => 8,
        }
    }

    pub fn write(self, buf: &mut [u8], v: f64) {
        match self {
            ElemType::F64 => buf.copy_from_slice(&v.to_le_bytes()),
            ElemType::I32 => buf.copy_from_slice(&(v as i32).to_le_bytes()),
            ElemType::I64 => buf.copy_from_slice(&(v as i64).to_le_bytes()),
        }
    }

    pub fn read(self, buf: &[u8]) -> f64 {
        match self {
            ElemType::F64 => f64::from_le_bytes(buf.try_into().unwrap()),
            ElemType::I32 => i32::from_le_bytes(buf.try_into().unwrap()) as f64,
            ElemType::I64 => i64::from_le_bytes(buf.try_into().unwrap()) as f64,
        }
    }
}

/// Declared calling convention of a compiled function, derived once from its
/// signature shape and semantic metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    /// Plain scalars in, scalar (or nothing) out.
    Scalar,
    /// (pointer, length), mutating the region in place.
    ArrayInPlace,
    /// (pointer, length, scalar) returning a scalar, e.g. a search.
    ArrayScalar,
    /// Fully flattened positional arguments.
    Flattened,
    /// (pointer, width, height, x-range, y-range, iteration-limit) filling a
    /// whole output grid in one call.
    RasterFill,
}

impl Convention {
    pub fn derive(
        params: &[ValType],
        results: &[ValType],
        metadata: Option<&SemanticMetadata>,
    ) -> Convention {
        let is_i32 = |t: &ValType| matches!(t, ValType::I32);
        if metadata.and_then(|m| m.renderer.as_deref()) == Some("raster") && params.len() >= 6 {
            return Convention::RasterFill;
        }
        let f64_count = params.iter().filter(|t| matches!(t, ValType::F64)).count();
        if params.len() >= 6
            && params.first().is_some_and(is_i32)
            && f64_count >= 4
            && results.is_empty()
        {
            return Convention::RasterFill;
        }
        if params.len() == 2 && params.iter().all(is_i32) && results.is_empty() {
            return Convention::ArrayInPlace;
        }
        if params.len() == 3
            && is_i32(&params[0])
            && is_i32(&params[1])
            && !results.is_empty()
        {
            return Convention::ArrayScalar;
        }
        if params.len() >= 4 && params.iter().filter(|t| matches!(t, ValType::I32)).count() >= 4 {
            return Convention::Flattened;
        }
        Convention::Scalar
    }
}

fn scalar_f64(v: &Value) -> Result<f64, EngineError> {
    match v {
        Value::Number(n) => Ok(*n),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Nil => Ok(0.0),
        other => Err(EngineError::Marshal(format!(
            "cannot pass {:?} across the native boundary",
            other
        ))),
    }
}

fn list_f64(items: &[Value]) -> Result<Vec<f64>, EngineError> {
    items.iter().map(scalar_f64).collect()
}

pub(crate) fn to_val(ty: &ValType, n: f64) -> Result<Val, EngineError> {
    match ty {
        ValType::I32 => Ok(Val::I32(n as i32)),
        ValType::I64 => Ok(Val::I64(n as i64)),
        ValType::F32 => Ok(Val::F32((n as f32).to_bits())),
        ValType::F64 => Ok(Val::F64(n.to_bits())),
        other => Err(EngineError::Marshal(format!(
            "unsupported parameter type {:?}",
            other
        ))),
    }
}

fn from_val(val: &Val) -> Result<f64, EngineError> {
    match val {
        Val::I32(v) => Ok(*v as f64),
        Val::I64(v) => Ok(*v as f64),
        Val::F32(bits) => Ok(f32::from_bits(*bits) as f64),
        Val::F64(bits) => Ok(f64::from_bits(*bits)),
        other => Err(EngineError::Marshal(format!(
            "unsupported result type {:?}",
            other
        ))),
    }
}

/// Call the entry point with raw numeric arguments, coercing each to the
/// parameter type the signature declares. Missing positions are zero-filled.
pub(crate) fn call_entry(
    store: &mut Store<()>,
    cf: &CompiledFunction,
    raw_args: &[f64],
) -> Result<Option<f64>, EngineError> {
    let params: Vec<Val> = cf
        .param_types
        .iter()
        .enumerate()
        .map(|(i, ty)| to_val(ty, raw_args.get(i).copied().unwrap_or(0.0)))
        .collect::<Result<_, _>>()?;
    let mut results = vec![Val::I64(0); cf.result_types.len()];
    cf.entry
        .call(&mut *store, &params, &mut results)
        .map_err(|e| EngineError::Trap(e.to_string()))?;
    results.first().map(from_val).transpose()
}

/// Interpret `[ptr, ptr + len*width)` through a typed view and materialize it
/// into host numbers.
pub fn read_back(
    store: &Store<()>,
    memory: Memory,
    elem: ElemType,
    ptr: u32,
    len: u32,
) -> Vec<f64> {
    let width = elem.width() as usize;
    let data = memory.data(store);
    let base = ptr as usize;
    (0..len as usize)
        .map(|i| elem.read(&data[base + i * width..base + (i + 1) * width]))
        .collect()
}

/// Invoke a compiled function with ordinary Lisp values.
///
/// The per-function `Convention` tag picks the path whenever the argument
/// shape can satisfy it. When it cannot, the shape rules decide instead, in
/// priority order: no arrays, a single array, array plus scalar, flattened.
pub fn invoke(
    engine: &mut Engine,
    cf: &CompiledFunction,
    args: &[Value],
) -> Result<Value, EngineError> {
    engine.arena.rebase(cf.heap_base);

    let has_array = args.iter().any(|a| a.as_list().is_some());
    let single_array = args.len() == 1 && has_array;
    let array_then_scalar =
        args.len() == 2 && args[0].as_list().is_some() && args[1].as_list().is_none();

    match cf.convention {
        Convention::Scalar if !has_array => return call_scalars(engine, cf, args),
        Convention::ArrayInPlace if single_array => return call_single_array(engine, cf, args),
        Convention::ArrayScalar if array_then_scalar => {
            return call_array_scalar(engine, cf, args);
        }
        Convention::Flattened if has_array => return call_flattened(engine, cf, args),
        _ => {}
    }

    if !has_array {
        call_scalars(engine, cf, args)
    } else if single_array {
        call_single_array(engine, cf, args)
    } else if array_then_scalar {
        call_array_scalar(engine, cf, args)
    } else {
        call_flattened(engine, cf, args)
    }
}

/// Direct scalar call, no memory traffic.
fn call_scalars(
    engine: &mut Engine,
    cf: &CompiledFunction,
    args: &[Value],
) -> Result<Value, EngineError> {
    let raw: Vec<f64> = args.iter().map(scalar_f64).collect::<Result<_, _>>()?;
    let ret = call_entry(&mut engine.store, cf, &raw)?;
    Ok(ret.map(Value::Number).unwrap_or(Value::Nil))
}

/// (pointer, length) over one array. The default assumption is in-place
/// mutation and the region is read back; metadata can opt out, in which
/// case the function's own scalar return is the result.
fn call_single_array(
    engine: &mut Engine,
    cf: &CompiledFunction,
    args: &[Value],
) -> Result<Value, EngineError> {
    let items = list_f64(args[0].as_list().unwrap())?;
    let (ptr, len) = engine
        .arena
        .alloc(&mut engine.store, cf.memory, cf.elem, &items)?;
    let ret = call_entry(&mut engine.store, cf, &[ptr as f64, len as f64])?;
    if cf.mutates_in_place() {
        let values = read_back(&engine.store, cf.memory, cf.elem, ptr, len);
        return Ok(Value::List(values.into_iter().map(Value::Number).collect()));
    }
    Ok(ret.map(Value::Number).unwrap_or(Value::Nil))
}

/// (pointer, length, scalar) → scalar result, e.g. a search.
fn call_array_scalar(
    engine: &mut Engine,
    cf: &CompiledFunction,
    args: &[Value],
) -> Result<Value, EngineError> {
    let items = list_f64(args[0].as_list().unwrap())?;
    let (ptr, len) = engine
        .arena
        .alloc(&mut engine.store, cf.memory, cf.elem, &items)?;
    let scalar = scalar_f64(&args[1])?;
    let ret = call_entry(&mut engine.store, cf, &[ptr as f64, len as f64, scalar])?;
    Ok(ret.map(Value::Number).unwrap_or(Value::Nil))
}

/// Generic path: every argument flattens positionally, arrays as
/// (pointer, length) pairs.
fn call_flattened(
    engine: &mut Engine,
    cf: &CompiledFunction,
    args: &[Value],
) -> Result<Value, EngineError> {
    let mut raw = Vec::new();
    for arg in args {
        match arg.as_list() {
            Some(items) => {
                let items = list_f64(items)?;
                let (ptr, len) = engine
                    .arena
                    .alloc(&mut engine.store, cf.memory, cf.elem, &items)?;
                raw.push(ptr as f64);
                raw.push(len as f64);
            }
            None => raw.push(scalar_f64(arg)?),
        }
    }
    let ret = call_entry(&mut engine.store, cf, &raw)?;
    Ok(ret.map(Value::Number).unwrap_or(Value::Nil))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, EngineConfig};
    use crate::testutil::{mock_compiled, sort_in_place_entry};
    use wasmtime::{Caller, Func};

    #[test]
    fn test_elem_type_inference() {
        let toks = |s: &[&str]| s.iter().map(|t| t.to_string()).collect::<Vec<_>>();
        assert_eq!(ElemType::from_tokens(&toks(&["i32", "f64"])), ElemType::F64);
        assert_eq!(ElemType::from_tokens(&toks(&["i32", "i32"])), ElemType::I32);
        assert_eq!(ElemType::from_tokens(&toks(&["i32", "i64"])), ElemType::I64);
        assert_eq!(ElemType::from_tokens(&toks(&[])), ElemType::I64);
    }

    #[test]
    fn test_convention_derivation() {
        use ValType::*;
        assert_eq!(
            Convention::derive(&[I32, I32], &[], None),
            Convention::ArrayInPlace
        );
        assert_eq!(
            Convention::derive(&[I32, I32, I64], &[I64], None),
            Convention::ArrayScalar
        );
        assert_eq!(
            Convention::derive(&[I64, I64], &[I64], None),
            Convention::Scalar
        );
        assert_eq!(
            Convention::derive(&[I32, I32, I32, F64, F64, F64, F64, I32], &[], None),
            Convention::RasterFill
        );
        assert_eq!(
            Convention::derive(&[I32, I32, I32, I32], &[I64], None),
            Convention::Flattened
        );
    }

    #[test]
    fn test_scalar_convention() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let add = Func::wrap(&mut engine.store, |a: i64, b: i64| -> i64 { a + b });
        let cf = mock_compiled(&mut engine, "add", add);
        let out = invoke(
            &mut engine,
            &cf,
            &[Value::Number(2.0), Value::Number(40.0)],
        )
        .unwrap();
        assert_eq!(out, Value::Number(42.0));
    }

    #[test]
    fn test_scalar_i32_coercion() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let double = Func::wrap(&mut engine.store, |x: i32| -> i32 { x * 2 });
        let cf = mock_compiled(&mut engine, "double", double);
        let out = invoke(&mut engine, &cf, &[Value::Number(21.0)]).unwrap();
        assert_eq!(out, Value::Number(42.0));
    }

    #[test]
    fn test_in_place_sort_convention() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let sort = sort_in_place_entry(&mut engine);
        let cf = mock_compiled(&mut engine, "sort", sort);

        engine.arena.reset();
        let region_start = engine.arena.cursor() as usize;
        let guard_at = region_start + 5 * 8;

        // Plant guard bytes just past where the 5-element region will land.
        engine.memory.data_mut(&mut engine.store)[guard_at..guard_at + 8]
            .copy_from_slice(&[0xAA; 8]);

        let input = Value::List(
            [5.0, 1.0, 4.0, 2.0, 8.0]
                .iter()
                .map(|n| Value::Number(*n))
                .collect(),
        );
        let out = invoke(&mut engine, &cf, &[input]).unwrap();
        assert_eq!(
            out,
            Value::List(
                [1.0, 2.0, 4.0, 5.0, 8.0]
                    .iter()
                    .map(|n| Value::Number(*n))
                    .collect()
            )
        );

        // Bytes immediately outside the allocated region are untouched.
        assert_eq!(
            &engine.memory.data(&engine.store)[guard_at..guard_at + 8],
            &[0xAA; 8]
        );
    }

    #[test]
    fn test_array_scalar_convention() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let mem = engine.memory;
        // Linear search: returns the index of the needle, or -1.
        let find = Func::wrap(
            &mut engine.store,
            move |mut caller: Caller<'_, ()>, ptr: i32, len: i32, needle: i64| -> i64 {
                let data = mem.data(&mut caller);
                let base = ptr as usize;
                for i in 0..len as usize {
                    let v = i64::from_le_bytes(
                        data[base + i * 8..base + i * 8 + 8].try_into().unwrap(),
                    );
                    if v == needle {
                        return i as i64;
                    }
                }
                -1
            },
        );
        let cf = mock_compiled(&mut engine, "find", find);
        let haystack = Value::List(
            [7.0, 9.0, 3.0]
                .iter()
                .map(|n| Value::Number(*n))
                .collect(),
        );
        let out = invoke(&mut engine, &cf, &[haystack, Value::Number(3.0)]).unwrap();
        assert_eq!(out, Value::Number(2.0));
    }

    #[test]
    fn test_flattened_convention() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let mem = engine.memory;
        // Sum of two arrays: (ptr, len, ptr, len) -> i64.
        let sum2 = Func::wrap(
            &mut engine.store,
            move |mut caller: Caller<'_, ()>, p1: i32, l1: i32, p2: i32, l2: i32| -> i64 {
                let data = mem.data(&mut caller);
                let read = |ptr: i32, len: i32| -> i64 {
                    let base = ptr as usize;
                    (0..len as usize)
                        .map(|i| {
                            i64::from_le_bytes(
                                data[base + i * 8..base + i * 8 + 8].try_into().unwrap(),
                            )
                        })
                        .sum()
                };
                read(p1, l1) + read(p2, l2)
            },
        );
        let cf = mock_compiled(&mut engine, "sum2", sum2);
        let a = Value::List(vec![Value::Number(1.0), Value::Number(2.0)]);
        let b = Value::List(vec![Value::Number(3.0), Value::Number(4.0)]);
        let out = invoke(&mut engine, &cf, &[a, b]).unwrap();
        assert_eq!(out, Value::Number(10.0));
    }

    #[test]
    fn test_flattened_tag_wins_over_single_array_shape() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let mem = engine.memory;
        let sum2 = Func::wrap(
            &mut engine.store,
            move |mut caller: Caller<'_, ()>, p1: i32, l1: i32, p2: i32, l2: i32| -> i64 {
                let data = mem.data(&mut caller);
                let read = |ptr: i32, len: i32| -> i64 {
                    let base = ptr as usize;
                    (0..len as usize)
                        .map(|i| {
                            i64::from_le_bytes(
                                data[base + i * 8..base + i * 8 + 8].try_into().unwrap(),
                            )
                        })
                        .sum()
                };
                read(p1, l1) + read(p2, l2)
            },
        );
        let cf = mock_compiled(&mut engine, "sum2-single", sum2);
        assert_eq!(cf.convention, Convention::Flattened);

        // A lone array would match the (pointer, length) read-back shape,
        // but the declared convention flattens it and the scalar sum comes
        // back instead.
        let a = Value::List(vec![
            Value::Number(1.0),
            Value::Number(2.0),
            Value::Number(3.0),
        ]);
        let out = invoke(&mut engine, &cf, &[a]).unwrap();
        assert_eq!(out, Value::Number(6.0));
    }
}
