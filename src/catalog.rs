//! The abstract operation catalog.
//!
//! Every operation a backend can bind is a [`Multimethod`]. Structured
//! operations ([`Ufunc`]s) are not bound one by one: they expose four facet
//! multimethods shared by every ufunc, and the ufunc itself travels with the
//! call as its receiver.
//!
//! Identities are allocated from a process-wide counter, so equality never
//! looks at names.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::sync::atomic::{AtomicU64, Ordering};

use lazy_static::lazy_static;

use crate::value::DispatchType;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates a process-unique identity.
pub(crate) fn fresh_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Opaque identity of a multimethod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(u64);

/// A named, backend-independent callable identity.
#[derive(Debug, Clone)]
pub struct Multimethod {
    id: OpId,
    name: &'static str,
}

impl Multimethod {
    /// Creates a new multimethod with a fresh identity.
    pub fn new(name: &'static str) -> Self {
        Self {
            id: OpId(fresh_id()),
            name,
        }
    }

    pub fn id(&self) -> OpId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for Multimethod {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Multimethod {}

impl Hash for Multimethod {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Multimethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Opaque identity of a ufunc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UfuncId(u64);

/// A structured element-wise operation.
///
/// Exposes four independently dispatchable facets: [`UFUNC_CALL`],
/// [`UFUNC_REDUCE`], [`UFUNC_ACCUMULATE`] and [`UFUNC_TYPES`].
#[derive(Debug, Clone)]
pub struct Ufunc {
    id: UfuncId,
    name: &'static str,
    nin: usize,
    nout: usize,
}

impl Ufunc {
    /// Creates a ufunc with a fresh identity.
    pub fn new(name: &'static str, nin: usize, nout: usize) -> Self {
        Self {
            id: UfuncId(fresh_id()),
            name,
            nin,
            nout,
        }
    }

    pub fn id(&self) -> UfuncId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of inputs.
    pub fn nin(&self) -> usize {
        self.nin
    }

    /// Number of outputs.
    pub fn nout(&self) -> usize {
        self.nout
    }
}

impl PartialEq for Ufunc {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Ufunc {}

impl Hash for Ufunc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Ufunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Names and arities (`nin`, `nout`) of the catalog's ufuncs.
pub const UFUNC_LIST: &[(&str, usize, usize)] = &[
    ("add", 2, 1),
    ("subtract", 2, 1),
    ("multiply", 2, 1),
    ("matmul", 2, 1),
    ("divide", 2, 1),
    ("logaddexp", 2, 1),
    ("logaddexp2", 2, 1),
    ("true_divide", 2, 1),
    ("floor_divide", 2, 1),
    ("negative", 1, 1),
    ("positive", 1, 1),
    ("power", 2, 1),
    ("remainder", 2, 1),
    ("fmod", 2, 1),
    ("divmod", 2, 2),
    ("absolute", 1, 1),
    ("fabs", 1, 1),
    ("rint", 1, 1),
    ("sign", 1, 1),
    ("heaviside", 2, 1),
    ("conj", 1, 1),
    ("exp", 1, 1),
    ("exp2", 1, 1),
    ("log", 1, 1),
    ("log2", 1, 1),
    ("log10", 1, 1),
    ("expm1", 1, 1),
    ("log1p", 1, 1),
    ("sqrt", 1, 1),
    ("square", 1, 1),
    ("cbrt", 1, 1),
    ("reciprocal", 1, 1),
    ("gcd", 2, 1),
    ("lcm", 2, 1),
    ("sin", 1, 1),
    ("cos", 1, 1),
    ("tan", 1, 1),
    ("arcsin", 1, 1),
    ("arccos", 1, 1),
    ("arctan", 1, 1),
    ("arctan2", 2, 1),
    ("hypot", 2, 1),
    ("sinh", 1, 1),
    ("cosh", 1, 1),
    ("tanh", 1, 1),
    ("arcsinh", 1, 1),
    ("arccosh", 1, 1),
    ("arctanh", 1, 1),
    ("deg2rad", 1, 1),
    ("rad2deg", 1, 1),
    ("bitwise_and", 2, 1),
    ("bitwise_or", 2, 1),
    ("bitwise_xor", 2, 1),
    ("invert", 1, 1),
    ("left_shift", 2, 1),
    ("right_shift", 2, 1),
    ("greater", 2, 1),
    ("greater_equal", 2, 1),
    ("less", 2, 1),
    ("less_equal", 2, 1),
    ("not_equal", 2, 1),
    ("equal", 2, 1),
    ("logical_and", 2, 1),
    ("logical_or", 2, 1),
    ("logical_xor", 2, 1),
    ("logical_not", 1, 1),
    ("maximum", 2, 1),
    ("minimum", 2, 1),
    ("fmax", 2, 1),
    ("fmin", 2, 1),
    ("isfinite", 1, 1),
    ("isinf", 1, 1),
    ("isnan", 1, 1),
    ("isnat", 1, 1),
    ("signbit", 1, 1),
    ("copysign", 2, 1),
    ("nextafter", 2, 1),
    ("spacing", 1, 1),
    ("modf", 1, 2),
    ("ldexp", 2, 1),
    ("frexp", 1, 2),
    ("floor", 1, 1),
    ("ceil", 1, 1),
    ("trunc", 1, 1),
];

lazy_static! {
    /// Primary invocation facet of every ufunc.
    pub static ref UFUNC_CALL: Multimethod = Multimethod::new("ufunc.__call__");
    /// Reduction facet of every ufunc.
    pub static ref UFUNC_REDUCE: Multimethod = Multimethod::new("ufunc.reduce");
    /// Accumulation facet of every ufunc.
    pub static ref UFUNC_ACCUMULATE: Multimethod = Multimethod::new("ufunc.accumulate");
    /// Supported type signatures of a ufunc.
    pub static ref UFUNC_TYPES: Multimethod = Multimethod::new("ufunc.types");

    pub static ref ARANGE: Multimethod = Multimethod::new("arange");
    pub static ref ARRAY: Multimethod = Multimethod::new("array");
    pub static ref ZEROS: Multimethod = Multimethod::new("zeros");
    pub static ref ONES: Multimethod = Multimethod::new("ones");
    pub static ref ASARRAY: Multimethod = Multimethod::new("asarray");

    /// Wrapper type for array-like arguments.
    pub static ref NDARRAY: DispatchType = DispatchType::new("ndarray");

    static ref UFUNCS: Vec<Ufunc> = UFUNC_LIST
        .iter()
        .map(|&(name, nin, nout)| Ufunc::new(name, nin, nout))
        .collect();
}

/// Every ufunc in the catalog, in catalog order.
pub fn ufuncs() -> &'static [Ufunc] {
    UFUNCS.as_slice()
}

/// Looks up a catalog ufunc by name.
pub fn ufunc(name: &str) -> Option<&'static Ufunc> {
    UFUNCS.iter().find(|u| u.name == name)
}

/// The four facet multimethods, in binding order.
pub fn facets() -> [&'static Multimethod; 4] {
    [&*UFUNC_CALL, &*UFUNC_REDUCE, &*UFUNC_ACCUMULATE, &*UFUNC_TYPES]
}
