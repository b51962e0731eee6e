//! The CPU engine as seen by the adapter.
//!
//! Native arrays are [`Ten64`], native scalars are `f64`. Element-wise
//! functions come from the exhaustive table in [`cpu`](super::cpu).

use crate::adapter::NativeEngine;
use crate::error::EngineError;
use crate::ops::cpu::{self, CpuUfunc, Operand, Output};
use briny::prelude::*;

use crate::tensors::{Ten64, Tensor};
use crate::value::{Arg, Call, Params, Value};

/// Runtime settings of the CPU engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuConfig {
    /// Element count from which kernels run on the rayon pool.
    pub parallel_threshold: usize,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: 1 << 14,
        }
    }
}

/// Rayon-backed engine over `f64` tensors.
#[derive(Debug, Clone, Default)]
pub struct CpuEngine {
    config: CpuConfig,
}

impl CpuEngine {
    pub fn with_config(config: CpuConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CpuConfig {
        &self.config
    }
}

impl From<Output> for Value {
    fn from(out: Output) -> Self {
        match out {
            Output::Scalar(x) => Value::new(x),
            Output::Array(t) => Value::new(t),
        }
    }
}

/// Largest magnitude an `i64` can have and still convert to `f64` exactly.
const MAX_EXACT_INT: u64 = 1 << 53;

/// Rejects tensors whose shape does not describe their data.
fn checked(t: &Ten64) -> Result<&Ten64, EngineError> {
    t.validate().map_err(|_| EngineError::InvalidShape {
        shape: t.shape.clone(),
        len: t.data.len(),
    })?;
    Ok(t)
}

/// Present arguments of `call`, as native operands.
///
/// A foreign operand is reported by its position among all arguments.
fn operands<'a>(name: &str, call: &'a Call) -> Result<Vec<Operand<'a>>, EngineError> {
    call.args
        .iter()
        .enumerate()
        .filter_map(|(index, arg)| arg.unwrapped().map(|value| (index, value)))
        .map(|(index, value)| {
            if let Some(t) = value.downcast_ref::<Ten64>() {
                checked(t).map(Operand::Array)
            } else if let Some(x) = value.downcast_ref::<f64>() {
                Ok(Operand::Scalar(*x))
            } else {
                Err(EngineError::ForeignOperand {
                    name: name.to_string(),
                    index,
                })
            }
        })
        .collect()
}

fn exactly<'a, const N: usize>(
    name: &str,
    call: &'a Call,
) -> Result<[Operand<'a>; N], EngineError> {
    let ops = operands(name, call)?;
    let got = ops.len();
    ops.try_into().map_err(|_| EngineError::Arity {
        name: name.to_string(),
        expected: N,
        got,
    })
}

fn scalar_of(name: &str, x: Operand<'_>) -> Result<f64, EngineError> {
    match x {
        Operand::Scalar(x) => Ok(x),
        Operand::Array(t) if t.ndim() == 0 => Ok(t.data[0]),
        Operand::Array(t) => Err(EngineError::InvalidArgument(format!(
            "{name} expects scalars, got an array of shape {:?}",
            t.shape
        ))),
    }
}

fn check_dtype(name: &'static str, params: &Params) -> Result<(), EngineError> {
    match params.dtype.as_deref() {
        None | Some("float64") | Some("f8") | Some("d") => Ok(()),
        Some(other) => Err(EngineError::InvalidArgument(format!(
            "{name}: unsupported dtype `{other}`"
        ))),
    }
}

fn filled(name: &'static str, call: &Call, value: f64) -> Result<Value, EngineError> {
    check_dtype(name, &call.params)?;
    let shape = call.params.shape.clone().ok_or(EngineError::MissingParam {
        name,
        param: "shape",
    })?;
    Ok(Value::new(Tensor::filled(shape, value)?))
}

fn first_arg<'a>(name: &'static str, call: &'a Call) -> Result<&'a Value, EngineError> {
    match call.args.iter().filter_map(Arg::unwrapped).collect::<Vec<_>>()[..] {
        [value] => Ok(value),
        ref other => Err(EngineError::Arity {
            name: name.to_string(),
            expected: 1,
            got: other.len(),
        }),
    }
}

impl NativeEngine for CpuEngine {
    type Array = Ten64;
    type Scalar = f64;
    type Ufunc = CpuUfunc;

    fn ufunc(&self, name: &str) -> Option<CpuUfunc> {
        cpu::lookup(name)
    }

    fn call(&self, ufunc: &CpuUfunc, call: &Call) -> Result<Value, EngineError> {
        let threshold = self.config.parallel_threshold;
        match ufunc.kernel {
            cpu::Kernel::Unary(f) => {
                let [x] = exactly::<1>(ufunc.name, call)?;
                Ok(cpu::unary(f, x, threshold).into())
            }
            cpu::Kernel::Binary(f) => {
                let [a, b] = exactly::<2>(ufunc.name, call)?;
                Ok(cpu::binary(f, a, b, threshold)?.into())
            }
        }
    }

    fn reduce(&self, ufunc: &CpuUfunc, call: &Call) -> Result<Value, EngineError> {
        let [x] = exactly::<1>(ufunc.name, call)?;
        Ok(cpu::reduce(ufunc, x, call.params.axis.unwrap_or(0))?.into())
    }

    fn accumulate(&self, ufunc: &CpuUfunc, call: &Call) -> Result<Value, EngineError> {
        let [x] = exactly::<1>(ufunc.name, call)?;
        Ok(cpu::accumulate(ufunc, x, call.params.axis.unwrap_or(0))?.into())
    }

    fn types(&self, ufunc: &CpuUfunc) -> Vec<String> {
        ufunc.types()
    }

    fn arange(&self, call: &Call) -> Result<Value, EngineError> {
        check_dtype("arange", &call.params)?;
        let ops = operands("arange", call)?;
        let bounds = ops
            .into_iter()
            .map(|x| scalar_of("arange", x))
            .collect::<Result<Vec<_>, _>>()?;
        let (start, stop, step) = match bounds[..] {
            [stop] => (0.0, stop, 1.0),
            [start, stop] => (start, stop, 1.0),
            [start, stop, step] => (start, stop, step),
            ref other => {
                return Err(EngineError::Arity {
                    name: "arange".to_string(),
                    expected: 3,
                    got: other.len(),
                });
            }
        };
        Ok(Value::new(cpu::arange(start, stop, step)?))
    }

    fn array(&self, call: &Call) -> Result<Value, EngineError> {
        check_dtype("array", &call.params)?;
        let value = first_arg("array", call)?;
        match value.downcast_ref::<Ten64>() {
            Some(t) => Ok(Value::new(checked(t)?.clone())),
            None => self.convert(value),
        }
    }

    fn zeros(&self, call: &Call) -> Result<Value, EngineError> {
        filled("zeros", call, 0.0)
    }

    fn ones(&self, call: &Call) -> Result<Value, EngineError> {
        filled("ones", call, 1.0)
    }

    fn asarray(&self, call: &Call) -> Result<Value, EngineError> {
        check_dtype("asarray", &call.params)?;
        self.convert(first_arg("asarray", call)?)
    }

    /// Tensors pass through without copying; scalars become 0-d tensors,
    /// `Vec<f64>` a 1-d tensor and `Vec<Vec<f64>>` a 2-d tensor.
    ///
    /// `i64` values beyond ±2^53 are rejected rather than rounded.
    fn convert(&self, value: &Value) -> Result<Value, EngineError> {
        if let Some(t) = value.downcast_ref::<Ten64>() {
            checked(t)?;
            return Ok(value.clone());
        }
        let scalar = if let Some(x) = value.downcast_ref::<f64>() {
            Some(*x)
        } else if let Some(x) = value.downcast_ref::<f32>() {
            Some(f64::from(*x))
        } else if let Some(x) = value.downcast_ref::<i32>() {
            Some(f64::from(*x))
        } else if let Some(x) = value.downcast_ref::<i64>() {
            if x.unsigned_abs() > MAX_EXACT_INT {
                return Err(EngineError::Conversion(value.type_name()));
            }
            Some(*x as f64)
        } else {
            None
        };
        if let Some(x) = scalar {
            return Ok(Value::new(Tensor::scalar(x)));
        }
        if let Some(v) = value.downcast_ref::<Vec<f64>>() {
            return Ok(Value::new(Tensor::new(vec![v.len()], v.clone())));
        }
        if let Some(rows) = value.downcast_ref::<Vec<Vec<f64>>>() {
            let cols = rows.first().map_or(0, Vec::len);
            if rows.iter().any(|r| r.len() != cols) {
                return Err(EngineError::InvalidArgument(
                    "ragged nested sequence".to_string(),
                ));
            }
            let data = rows.iter().flatten().copied().collect();
            return Ok(Value::new(Tensor::try_new(vec![rows.len(), cols], data)?));
        }
        Err(EngineError::Conversion(value.type_name()))
    }
}
