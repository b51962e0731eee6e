//! Error types for dispatch and the native engines.
//!
//! Only genuine failures live here. A backend that cannot service a call
//! says so with [`Outcome::Unhandled`](crate::value::Outcome), never with an
//! error.

use thiserror::Error;

/// Failures raised by a native engine while actually running a call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Operand shapes cannot be combined.
    #[error("shape mismatch: {0:?} and {1:?}")]
    ShapeMismatch(Vec<usize>, Vec<usize>),

    /// The call carried the wrong number of operands.
    #[error("{name} expects {expected} operand(s), got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    /// `reduce`/`accumulate` on a function that is not binary.
    #[error("{0} is not a binary function; reduce and accumulate need two inputs")]
    NotBinary(String),

    /// Axis outside the array's dimensions.
    #[error("axis {axis} is out of bounds for array of dimension {ndim}")]
    InvalidAxis { axis: usize, ndim: usize },

    /// Reduction over an empty axis of a function without identity.
    #[error("zero-size reduction with {0}, which has no identity")]
    EmptyReduction(String),

    /// An operand is neither a native array nor a native scalar.
    #[error("operand {index} of {name} is not a native value")]
    ForeignOperand { name: String, index: usize },

    /// A required parameter was not supplied.
    #[error("{name} requires the `{param}` parameter")]
    MissingParam {
        name: &'static str,
        param: &'static str,
    },

    /// A parameter was supplied but is not usable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Shape and data length disagree.
    #[error("data of length {len} does not fit shape {shape:?}")]
    InvalidShape { shape: Vec<usize>, len: usize },

    /// A value could not be coerced into the native representation.
    #[error("cannot convert a value of type `{0}` to a native array")]
    Conversion(&'static str),
}

/// Failures surfaced by the dispatcher and the registry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    /// A backend attempted the call and its engine failed.
    #[error("backend `{backend}` failed: {source}")]
    Engine {
        backend: String,
        #[source]
        source: EngineError,
    },

    /// A backend's conversion hook failed to coerce a wrapped value.
    #[error("backend `{backend}` could not convert argument {index}: {source}")]
    Conversion {
        backend: String,
        index: usize,
        #[source]
        source: EngineError,
    },

    /// Every candidate backend declined the call.
    #[error("no backend implements `{0}` for these arguments")]
    NoImplementation(String),

    /// A process-wide registry has already been installed.
    #[error("a global registry is already installed")]
    AlreadyInstalled,

    /// The handled result did not have the expected type.
    #[error("`{op}` returned a value that is not a {expected}")]
    UnexpectedResult { op: String, expected: &'static str },
}

/// Result alias used by the dispatch layer.
pub type Result<T> = std::result::Result<T, DispatchError>;
