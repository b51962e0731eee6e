//! Parallel CPU kernels.
//!
//! # CPU Kernels
//!
//! Element-wise functions, reductions and accumulations over [`Ten64`]
//! arrays and `f64` scalars. This is the numerical core of
//! [`CpuEngine`](super::engine::CpuEngine); it knows nothing about dispatch.
//!
//! ## Features
//!
//! - Parallel execution using [`rayon`](https://docs.rs/rayon) (`parallel` feature)
//! - Serial fallback for small inputs or when the feature is disabled
//!
//! ## Implemented Functions
//!
//! The table in [`lookup`] is exhaustive: a name missing from it is a
//! function this engine does not provide.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::EngineError;
use crate::tensors::{Ten64, Tensor, axis_extents, buffer};

/// Numerical body of an element-wise function.
#[derive(Clone, Copy)]
pub enum Kernel {
    Unary(fn(f64) -> f64),
    Binary(fn(f64, f64) -> f64),
}

/// Output category, used for type signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Arithmetic,
    Comparison,
}

/// One element-wise function of the CPU engine.
#[derive(Clone, Copy)]
pub struct CpuUfunc {
    pub name: &'static str,
    pub kernel: Kernel,
    pub kind: Kind,
    /// Value a reduction over an empty axis returns.
    pub identity: Option<f64>,
}

impl CpuUfunc {
    const fn unary(name: &'static str, f: fn(f64) -> f64) -> Self {
        Self {
            name,
            kernel: Kernel::Unary(f),
            kind: Kind::Arithmetic,
            identity: None,
        }
    }

    const fn binary(name: &'static str, f: fn(f64, f64) -> f64, identity: Option<f64>) -> Self {
        Self {
            name,
            kernel: Kernel::Binary(f),
            kind: Kind::Arithmetic,
            identity,
        }
    }

    const fn compare(name: &'static str, f: fn(f64, f64) -> f64) -> Self {
        Self {
            name,
            kernel: Kernel::Binary(f),
            kind: Kind::Comparison,
            identity: None,
        }
    }

    /// Number of inputs.
    pub fn nin(&self) -> usize {
        match self.kernel {
            Kernel::Unary(_) => 1,
            Kernel::Binary(_) => 2,
        }
    }

    /// Type signatures in `inputs->output` notation.
    pub fn types(&self) -> Vec<String> {
        let sig = match (self.kernel, self.kind) {
            (Kernel::Unary(_), _) => "d->d",
            (Kernel::Binary(_), Kind::Arithmetic) => "dd->d",
            (Kernel::Binary(_), Kind::Comparison) => "dd->?",
        };
        vec![sig.to_string()]
    }

    fn binary_kernel(&self) -> Result<fn(f64, f64) -> f64, EngineError> {
        match self.kernel {
            Kernel::Binary(f) => Ok(f),
            Kernel::Unary(_) => Err(EngineError::NotBinary(self.name.to_string())),
        }
    }
}

fn truth(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        x
    }
}

fn logaddexp(a: f64, b: f64) -> f64 {
    let m = a.max(b);
    if m == f64::NEG_INFINITY {
        return m;
    }
    m + ((a - m).exp() + (b - m).exp()).ln()
}

fn propagate_nan(a: f64, b: f64, f: fn(f64, f64) -> f64) -> f64 {
    if a.is_nan() || b.is_nan() { f64::NAN } else { f(a, b) }
}

const UFUNCS: &[CpuUfunc] = &[
    CpuUfunc::binary("add", |a, b| a + b, Some(0.0)),
    CpuUfunc::binary("subtract", |a, b| a - b, None),
    CpuUfunc::binary("multiply", |a, b| a * b, Some(1.0)),
    CpuUfunc::binary("divide", |a, b| a / b, None),
    CpuUfunc::binary("true_divide", |a, b| a / b, None),
    CpuUfunc::binary("power", f64::powf, None),
    CpuUfunc::binary("maximum", |a, b| propagate_nan(a, b, f64::max), None),
    CpuUfunc::binary("minimum", |a, b| propagate_nan(a, b, f64::min), None),
    CpuUfunc::binary("fmax", f64::max, None),
    CpuUfunc::binary("fmin", f64::min, None),
    CpuUfunc::binary("hypot", f64::hypot, Some(0.0)),
    CpuUfunc::binary("arctan2", f64::atan2, None),
    CpuUfunc::binary("copysign", f64::copysign, None),
    CpuUfunc::binary("logaddexp", logaddexp, Some(f64::NEG_INFINITY)),
    CpuUfunc::compare("greater", |a, b| truth(a > b)),
    CpuUfunc::compare("greater_equal", |a, b| truth(a >= b)),
    CpuUfunc::compare("less", |a, b| truth(a < b)),
    CpuUfunc::compare("less_equal", |a, b| truth(a <= b)),
    CpuUfunc::compare("equal", |a, b| truth(a == b)),
    CpuUfunc::compare("not_equal", |a, b| truth(a != b)),
    CpuUfunc::unary("negative", |x| -x),
    CpuUfunc::unary("positive", |x| x),
    CpuUfunc::unary("absolute", f64::abs),
    CpuUfunc::unary("fabs", f64::abs),
    CpuUfunc::unary("sign", sign),
    CpuUfunc::unary("sqrt", f64::sqrt),
    CpuUfunc::unary("square", |x| x * x),
    CpuUfunc::unary("cbrt", f64::cbrt),
    CpuUfunc::unary("reciprocal", f64::recip),
    CpuUfunc::unary("exp", f64::exp),
    CpuUfunc::unary("exp2", f64::exp2),
    CpuUfunc::unary("expm1", f64::exp_m1),
    CpuUfunc::unary("log", f64::ln),
    CpuUfunc::unary("log2", f64::log2),
    CpuUfunc::unary("log10", f64::log10),
    CpuUfunc::unary("log1p", f64::ln_1p),
    CpuUfunc::unary("sin", f64::sin),
    CpuUfunc::unary("cos", f64::cos),
    CpuUfunc::unary("tan", f64::tan),
    CpuUfunc::unary("arcsin", f64::asin),
    CpuUfunc::unary("arccos", f64::acos),
    CpuUfunc::unary("arctan", f64::atan),
    CpuUfunc::unary("sinh", f64::sinh),
    CpuUfunc::unary("cosh", f64::cosh),
    CpuUfunc::unary("tanh", f64::tanh),
    CpuUfunc::unary("floor", f64::floor),
    CpuUfunc::unary("ceil", f64::ceil),
    CpuUfunc::unary("trunc", f64::trunc),
    CpuUfunc::unary("rint", f64::round_ties_even),
];

/// Finds the engine's function called `name`.
pub fn lookup(name: &str) -> Option<CpuUfunc> {
    UFUNCS.iter().find(|u| u.name == name).copied()
}

/// Names of every function the engine provides.
pub fn names() -> impl Iterator<Item = &'static str> {
    UFUNCS.iter().map(|u| u.name)
}

/// A native operand: a bare scalar or a borrowed array.
#[derive(Debug, Clone, Copy)]
pub enum Operand<'a> {
    Scalar(f64),
    Array(&'a Ten64),
}

/// Result of an element-wise kernel.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Scalar(f64),
    Array(Ten64),
}

fn map_data(data: &[f64], threshold: usize, f: impl Fn(f64) -> f64 + Send + Sync) -> Vec<f64> {
    #[cfg(feature = "parallel")]
    {
        if data.len() >= threshold {
            return data.par_iter().map(|&x| f(x)).collect();
        }
    }
    #[cfg(not(feature = "parallel"))]
    let _ = threshold;

    data.iter().map(|&x| f(x)).collect()
}

fn zip_data(a: &[f64], b: &[f64], threshold: usize, f: fn(f64, f64) -> f64) -> Vec<f64> {
    #[cfg(feature = "parallel")]
    {
        if a.len() >= threshold {
            return a.par_iter().zip(b).map(|(&x, &y)| f(x, y)).collect();
        }
    }
    #[cfg(not(feature = "parallel"))]
    let _ = threshold;

    a.iter().zip(b).map(|(&x, &y)| f(x, y)).collect()
}

/// Applies a unary kernel.
pub fn unary(f: fn(f64) -> f64, x: Operand<'_>, threshold: usize) -> Output {
    match x {
        Operand::Scalar(x) => Output::Scalar(f(x)),
        Operand::Array(t) => Output::Array(Tensor {
            shape: t.shape.clone(),
            data: map_data(&t.data, threshold, f),
        }),
    }
}

/// Applies a binary kernel.
///
/// Scalars and zero-dimensional arrays combine with arrays of any shape;
/// two arrays otherwise need identical shapes.
pub fn binary(
    f: fn(f64, f64) -> f64,
    a: Operand<'_>,
    b: Operand<'_>,
    threshold: usize,
) -> Result<Output, EngineError> {
    use Operand::{Array, Scalar};

    Ok(match (a, b) {
        (Scalar(x), Scalar(y)) => Output::Scalar(f(x, y)),
        (Scalar(x), Array(t)) => Output::Array(Tensor {
            shape: t.shape.clone(),
            data: map_data(&t.data, threshold, move |y| f(x, y)),
        }),
        (Array(t), Scalar(y)) => Output::Array(Tensor {
            shape: t.shape.clone(),
            data: map_data(&t.data, threshold, move |x| f(x, y)),
        }),
        (Array(s), Array(t)) if s.shape == t.shape => Output::Array(Tensor {
            shape: s.shape.clone(),
            data: zip_data(&s.data, &t.data, threshold, f),
        }),
        (Array(s), Array(t)) if s.ndim() == 0 => {
            return binary(f, Scalar(s.data[0]), Array(t), threshold);
        }
        (Array(s), Array(t)) if t.ndim() == 0 => {
            return binary(f, Array(s), Scalar(t.data[0]), threshold);
        }
        (Array(s), Array(t)) => {
            return Err(EngineError::ShapeMismatch(s.shape.clone(), t.shape.clone()));
        }
    })
}

fn array_operand(x: Operand<'_>, axis: usize) -> Result<&Ten64, EngineError> {
    match x {
        Operand::Array(t) => Ok(t),
        Operand::Scalar(_) => Err(EngineError::InvalidAxis { axis, ndim: 0 }),
    }
}

/// Reduces `x` along `axis` with a binary function.
///
/// Removing the only axis yields a scalar.
pub fn reduce(ufunc: &CpuUfunc, x: Operand<'_>, axis: usize) -> Result<Output, EngineError> {
    let f = ufunc.binary_kernel()?;
    let t = array_operand(x, axis)?;
    let (outer, len, inner) = axis_extents(&t.shape, axis)?;
    if len == 0 && outer * inner > 0 {
        ufunc
            .identity
            .ok_or_else(|| EngineError::EmptyReduction(ufunc.name.to_string()))?;
    }

    let data: Vec<f64> = (0..outer * inner)
        .map(|idx| {
            let (o, n) = (idx / inner, idx % inner);
            let mut values = (0..len).map(|i| t.data[(o * len + i) * inner + n]);
            match values.next() {
                Some(first) => values.fold(first, f),
                None => ufunc.identity.unwrap_or(f64::NAN),
            }
        })
        .collect();

    let mut shape = t.shape.clone();
    shape.remove(axis);
    if shape.is_empty() {
        return Ok(Output::Scalar(data[0]));
    }
    Ok(Output::Array(Tensor { shape, data }))
}

/// Running application of a binary function along `axis`.
pub fn accumulate(ufunc: &CpuUfunc, x: Operand<'_>, axis: usize) -> Result<Output, EngineError> {
    let f = ufunc.binary_kernel()?;
    let t = array_operand(x, axis)?;
    let (outer, len, inner) = axis_extents(&t.shape, axis)?;

    let mut data = t.data.clone();
    for o in 0..outer {
        for n in 0..inner {
            for i in 1..len {
                let prev = data[(o * len + i - 1) * inner + n];
                let at = (o * len + i) * inner + n;
                data[at] = f(prev, data[at]);
            }
        }
    }
    Ok(Output::Array(Tensor {
        shape: t.shape.clone(),
        data,
    }))
}

/// Evenly spaced values in `[start, stop)`.
pub fn arange(start: f64, stop: f64, step: f64) -> Result<Ten64, EngineError> {
    if step == 0.0 || !step.is_finite() {
        return Err(EngineError::InvalidArgument(format!(
            "arange step must be finite and nonzero, got {step}"
        )));
    }
    let count = ((stop - start) / step).ceil();
    if !count.is_finite() {
        return Err(EngineError::InvalidArgument(format!(
            "arange bounds must be finite, got {start}..{stop}"
        )));
    }
    // `usize::MAX as f64` rounds up to 2^64, so `>=` excludes every saturating cast.
    if count >= usize::MAX as f64 {
        return Err(EngineError::InvalidArgument(format!(
            "arange from {start} to {stop} by {step} has too many elements"
        )));
    }
    let count = if count > 0.0 { count as usize } else { 0 };
    let mut data = buffer(count)?;
    data.extend((0..count).map(|i| start + i as f64 * step));
    Ok(Tensor {
        shape: vec![count],
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor;

    fn get(name: &str) -> CpuUfunc {
        lookup(name).unwrap()
    }

    #[test]
    fn test_lookup_is_exhaustive() {
        assert!(lookup("add").is_some());
        assert!(lookup("gcd").is_none());
        assert!(names().all(|n| lookup(n).is_some()));
    }

    #[test]
    fn test_binary_scalars() {
        let add = get("add").binary_kernel().unwrap();
        let out = binary(add, Operand::Scalar(2.0), Operand::Scalar(3.0), 1).unwrap();
        assert_eq!(out, Output::Scalar(5.0));
    }

    #[test]
    fn test_binary_broadcast_scalar() {
        let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
        let sub = get("subtract").binary_kernel().unwrap();
        let out = binary(sub, Operand::Scalar(10.0), Operand::Array(&t), 1).unwrap();
        assert_eq!(out, Output::Array(tensor!([[9.0, 8.0], [7.0, 6.0]])));
    }

    #[test]
    fn test_binary_zero_dim_array() {
        let t = tensor!([1.0, 2.0]);
        let s = Tensor::scalar(2.0);
        let mul = get("multiply").binary_kernel().unwrap();
        let out = binary(mul, Operand::Array(&t), Operand::Array(&s), usize::MAX).unwrap();
        assert_eq!(out, Output::Array(tensor!([2.0, 4.0])));
    }

    #[test]
    fn test_binary_shape_mismatch() {
        let a = tensor!([1.0, 2.0]);
        let b = tensor!([1.0, 2.0, 3.0]);
        let add = get("add").binary_kernel().unwrap();
        assert_eq!(
            binary(add, Operand::Array(&a), Operand::Array(&b), 1),
            Err(EngineError::ShapeMismatch(vec![2], vec![3]))
        );
    }

    #[test]
    fn test_parallel_and_serial_agree() {
        let t = Tensor::new(vec![4096], (0..4096).map(|i| i as f64).collect());
        let serial = unary(f64::sqrt, Operand::Array(&t), usize::MAX);
        let parallel = unary(f64::sqrt, Operand::Array(&t), 1);
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_reduce_axes() {
        let t = tensor!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let add = get("add");
        assert_eq!(
            reduce(&add, Operand::Array(&t), 0).unwrap(),
            Output::Array(tensor!([5.0, 7.0, 9.0]))
        );
        assert_eq!(
            reduce(&add, Operand::Array(&t), 1).unwrap(),
            Output::Array(tensor!([6.0, 15.0]))
        );
        let v = tensor!([1.0, 2.0, 3.0, 4.0]);
        assert_eq!(reduce(&get("multiply"), Operand::Array(&v), 0).unwrap(), Output::Scalar(24.0));
    }

    #[test]
    fn test_reduce_errors() {
        let v = tensor!([1.0, 2.0]);
        assert_eq!(
            reduce(&get("sqrt"), Operand::Array(&v), 0),
            Err(EngineError::NotBinary("sqrt".into()))
        );
        assert_eq!(
            reduce(&get("add"), Operand::Array(&v), 1),
            Err(EngineError::InvalidAxis { axis: 1, ndim: 1 })
        );
        assert_eq!(
            reduce(&get("add"), Operand::Scalar(1.0), 0),
            Err(EngineError::InvalidAxis { axis: 0, ndim: 0 })
        );
    }

    #[test]
    fn test_reduce_empty_axis() {
        let empty = Tensor::new(vec![0], Vec::new());
        assert_eq!(reduce(&get("add"), Operand::Array(&empty), 0).unwrap(), Output::Scalar(0.0));
        assert_eq!(
            reduce(&get("subtract"), Operand::Array(&empty), 0),
            Err(EngineError::EmptyReduction("subtract".into()))
        );
    }

    #[test]
    fn test_accumulate() {
        let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
        let add = get("add");
        assert_eq!(
            accumulate(&add, Operand::Array(&t), 0).unwrap(),
            Output::Array(tensor!([[1.0, 2.0], [4.0, 6.0]]))
        );
        assert_eq!(
            accumulate(&add, Operand::Array(&t), 1).unwrap(),
            Output::Array(tensor!([[1.0, 3.0], [3.0, 7.0]]))
        );
    }

    #[test]
    fn test_types() {
        assert_eq!(get("add").types(), vec!["dd->d"]);
        assert_eq!(get("less").types(), vec!["dd->?"]);
        assert_eq!(get("exp").types(), vec!["d->d"]);
    }

    #[test]
    fn test_arange() {
        assert_eq!(arange(0.0, 5.0, 1.0).unwrap().data, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(arange(1.0, 2.0, 0.25).unwrap().data, vec![1.0, 1.25, 1.5, 1.75]);
        assert_eq!(arange(5.0, 0.0, -2.0).unwrap().data, vec![5.0, 3.0, 1.0]);
        assert!(arange(5.0, 0.0, 1.0).unwrap().is_empty());
        assert!(arange(0.0, 1.0, 0.0).is_err());
    }

    #[test]
    fn test_arange_too_many_elements() {
        for stop in [1e300, 1e19, f64::INFINITY] {
            assert!(matches!(
                arange(0.0, stop, 1.0),
                Err(EngineError::InvalidArgument(_))
            ));
        }
        assert!(arange(0.0, 1.0, 1e-300).is_err());
        assert!(arange(f64::NAN, 1.0, 1.0).is_err());
    }
}
