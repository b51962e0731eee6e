//! # Operation Layer
//!
//! The CPU engine and the free functions that route operations through the
//! backend registry.
//!
//! ## Submodules
//!
//! - [`cpu`] — Element-wise kernels, reductions and accumulations over `f64` tensors
//! - [`engine`] — [`CpuEngine`](engine::CpuEngine), the kernels exposed as a native engine
//! - [`dispatch`] — Registry-routed entry points (`ufunc_call`, `reduce`, `zeros`, ...)
//!
//! ## Backend Selection
//!
//! Callers never pick a backend. The registry tries each declared backend
//! in declaration order and the first one that accepts the arguments runs
//! the call.
//!
//! Example:
//! ```rust
//! use array_dispatch::ops::dispatch;
//! use array_dispatch::tensors::Ten64;
//!
//! let z = dispatch::zeros(vec![2, 2]).unwrap();
//! assert_eq!(z.downcast_ref::<Ten64>().unwrap().data, vec![0.0; 4]);
//! ```
//!
//! ## Extending the Engine
//!
//! To add an element-wise function:
//!
//! 1. Add it to the kernel table in [`cpu`]
//! 2. Make sure its name is in the catalog, or it will never be resolved
//!
//! ## Feature Flags
//!
//! - `parallel` — Runs large kernels on the `rayon` pool (default)

pub mod cpu;
pub mod dispatch;
pub mod engine;
