//! Native array type of the CPU engine.
//!
//! # Core Tensor Utilities
//!
//! A [`Tensor`] is an N-dimensional array stored as a shape plus flat,
//! row-major data. Zero-dimensional tensors hold exactly one element.
//!
//! ## Design Highlights
//! - Tensors are strongly typed: `Tensor<T>` for any element type, `Ten64` for
//!   the engine's `f64` arrays
//! - Shape is stored as a `Vec<usize>` and checked at construction
//! - The `tensor!` macro supports ergonomic tensor creation from nested arrays
//!
//! ## Limitations
//! - Row-major only
//! - Broadcasting is limited to scalar ⊕ array
//!
//! ## Example
//!
//! ```rust
//! use array_dispatch::tensors::Tensor;
//! let t = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! assert_eq!(t.shape, vec![2, 3]);
//! ```

use briny::prelude::*;

use crate::error::EngineError;

/// Represents an N-dimensional tensor with a shape and flat row-major data.
///
/// - `shape` defines the structure, e.g., `[2, 3]` for a 2×3 matrix.
/// - `data` holds the flattened content in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    pub shape: Vec<usize>,
    pub data: Vec<T>,
}

/// The CPU engine's array type.
pub type Ten64 = Tensor<f64>;

impl<T> Validate for Tensor<T> {
    fn validate(&self) -> Result<(), ValidationError> {
        if element_count(&self.shape) != Some(self.data.len()) {
            return Err(ValidationError);
        }
        Ok(())
    }
}

/// Number of elements described by `shape`, or `None` if it overflows.
pub fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |n, &dim| n.checked_mul(dim))
}

/// An empty buffer with room for exactly `len` elements.
///
/// Fails instead of aborting when the allocation is impossible.
pub(crate) fn buffer<T>(len: usize) -> Result<Vec<T>, EngineError> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| EngineError::InvalidArgument(format!("cannot allocate {len} elements")))?;
    Ok(data)
}

impl<T> Tensor<T> {
    /// Creates a new tensor with the given shape and flat data.
    ///
    /// # Panics
    /// Panics if the number of elements in `data` does not match the shape product.
    pub fn new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Self {
        let shape = shape.into();
        assert_eq!(
            element_count(&shape),
            Some(data.len()),
            "shape {:?} is incompatible with {} data elements",
            shape,
            data.len()
        );
        Self { shape, data }
    }

    /// Fallible form of [`Tensor::new`].
    pub fn try_new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Result<Self, EngineError> {
        let tensor = Self {
            shape: shape.into(),
            data,
        };
        match tensor.validate() {
            Ok(()) => Ok(tensor),
            Err(_) => Err(EngineError::InvalidShape {
                shape: tensor.shape,
                len: tensor.data.len(),
            }),
        }
    }

    /// A zero-dimensional tensor holding one element.
    pub fn scalar(value: T) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<T: Clone> Tensor<T> {
    /// A tensor of `shape` with every element set to `value`.
    pub fn filled(shape: impl Into<Vec<usize>>, value: T) -> Result<Self, EngineError> {
        let shape = shape.into();
        let Some(len) = element_count(&shape) else {
            return Err(EngineError::InvalidArgument(format!(
                "shape {shape:?} has too many elements"
            )));
        };
        let mut data = buffer(len)?;
        data.resize(len, value);
        Ok(Self { shape, data })
    }
}

/// Splits `shape` around `axis` into `(outer, len, inner)` extents.
///
/// Element `(o, i, n)` of the view lives at `(o * len + i) * inner + n`.
pub(crate) fn axis_extents(
    shape: &[usize],
    axis: usize,
) -> Result<(usize, usize, usize), EngineError> {
    if axis >= shape.len() {
        return Err(EngineError::InvalidAxis {
            axis,
            ndim: shape.len(),
        });
    }
    let outer = shape[..axis].iter().product();
    let inner = shape[axis + 1..].iter().product();
    Ok((outer, shape[axis], inner))
}

/// Defines a tensor from nested literal arrays.
///
/// Supports arbitrary dimensionality as long as sublists are uniform in shape.
///
/// # Example
/// ```
/// use array_dispatch::tensor;
/// let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
/// assert_eq!(t.shape, vec![2, 2]);
/// ```
#[macro_export]
macro_rules! tensor {
    ($lit:literal) => {
        $crate::tensors::Tensor::new(Vec::<usize>::new(), vec![$lit])
    };

    ([ $( $inner:tt ),+ $(,)? ]) => {{
        let children = vec![ $( $crate::tensor!($inner) ),+ ];
        let first_shape = &children[0].shape;
        assert!(children.iter().all(|c| c.shape == *first_shape),
            "ragged tensor literal (rows have mismatched shapes)");
        let mut shape = vec![children.len()];
        shape.extend_from_slice(first_shape);
        let mut data = Vec::with_capacity(children.len() * children[0].data.len());
        for c in children { data.extend(c.data); }
        $crate::tensors::Tensor::new(shape, data)
    }};
}
