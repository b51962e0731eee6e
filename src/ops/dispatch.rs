//! Operation Dispatch Layer
//!
//! Free functions that build a [`Call`] and hand it to the process-wide
//! registry, installing the CPU-only default on first use.
//!
//! Each function tries the declared backends in declaration order:
//! 1. Backends whose compatibility check rejects the arguments are skipped
//! 2. Backends that decline the call are skipped
//! 3. The first result or genuine error is returned
//!
//! # Example
//! ```rust
//! use array_dispatch::{catalog, tensor, tensors::Ten64, value::Arg};
//! use array_dispatch::ops::dispatch;
//!
//! let add = catalog::ufunc("add").unwrap();
//! let args = vec![Arg::value(tensor!([1.0, 2.0])), Arg::value(1.0f64)];
//! let out = dispatch::ufunc_call(add, args).unwrap();
//! assert_eq!(out.downcast_ref::<Ten64>(), Some(&tensor!([2.0, 3.0])));
//! ```

use crate::catalog::{
    ARANGE, ARRAY, ASARRAY, Multimethod, ONES, UFUNC_ACCUMULATE, UFUNC_CALL, UFUNC_REDUCE,
    UFUNC_TYPES, Ufunc, ZEROS,
};
use crate::error::{DispatchError, Result};
use crate::registry::global_or_default;
use crate::value::{Arg, Call, Params, Value};

fn run(op: &Multimethod, call: Call) -> Result<Value> {
    global_or_default().dispatch(op, &call)
}

/// Applies `ufunc` element-wise to `args`.
pub fn ufunc_call(ufunc: &Ufunc, args: Vec<Arg>) -> Result<Value> {
    run(&UFUNC_CALL, Call::new(args).through(ufunc))
}

/// Reduces `arg` with `ufunc` along `axis` (default 0).
pub fn reduce(ufunc: &Ufunc, arg: Arg, axis: Option<usize>) -> Result<Value> {
    run(&UFUNC_REDUCE, facet_call(ufunc, arg, axis))
}

/// Running application of `ufunc` along `axis` (default 0).
pub fn accumulate(ufunc: &Ufunc, arg: Arg, axis: Option<usize>) -> Result<Value> {
    run(&UFUNC_ACCUMULATE, facet_call(ufunc, arg, axis))
}

fn facet_call(ufunc: &Ufunc, arg: Arg, axis: Option<usize>) -> Call {
    let mut params = Params::default();
    params.axis = axis;
    Call::new(vec![arg]).through(ufunc).with_params(params)
}

/// Type signatures `ufunc` supports on the handling backend.
pub fn types(ufunc: &Ufunc) -> Result<Vec<String>> {
    let value = run(&UFUNC_TYPES, Call::default().through(ufunc))?;
    value
        .downcast_ref::<Vec<String>>()
        .cloned()
        .ok_or_else(|| DispatchError::UnexpectedResult {
            op: UFUNC_TYPES.name().to_string(),
            expected: "Vec<String>",
        })
}

/// Evenly spaced values; `bounds` is `[stop]`, `[start, stop]` or `[start, stop, step]`.
pub fn arange(bounds: Vec<Arg>) -> Result<Value> {
    run(&ARANGE, Call::new(bounds))
}

/// Copies `arg` into a new native array.
pub fn array(arg: Arg) -> Result<Value> {
    run(&ARRAY, Call::new(vec![arg]))
}

pub fn zeros(shape: impl Into<Vec<usize>>) -> Result<Value> {
    run(&ZEROS, Call::default().with_params(Params::default().shape(shape)))
}

pub fn ones(shape: impl Into<Vec<usize>>) -> Result<Value> {
    run(&ONES, Call::default().with_params(Params::default().shape(shape)))
}

/// Converts `arg` to a native array, reusing it when it already is one.
pub fn asarray(arg: Arg) -> Result<Value> {
    run(&ASARRAY, Call::new(vec![arg]))
}
