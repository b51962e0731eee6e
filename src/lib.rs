//! array_dispatch: pluggable array backends behind a single call protocol.
//!
//! Operations are named by [`Multimethod`](catalog::Multimethod)s. Backends
//! bind implementations to them, and a frozen [`Registry`](registry::Registry)
//! routes each call to the first backend that accepts its arguments.
//!
//! # Features
//!
//! - Per-backend compatibility predicates and an explicit "not handled" outcome.
//! - Generic adapter that turns any [`NativeEngine`](adapter::NativeEngine) into a backend.
//! - Conversion hooks that materialize wrapped arguments before a call.
//! - A parallel CPU engine over `f64` tensors.
//!
//! # Modules
//!
//! - [`catalog`] — Multimethods, ufuncs and dispatch types known to the crate.
//! - [`value`] — Type-erased values, arguments and calls.
//! - [`backend`] — Bindings, compatibility checks and conversion hooks.
//! - [`registry`] — Build-then-freeze registry and the dispatcher.
//! - [`adapter`] — Self-resolution tables and bulk binding of engines.
//! - [`ops`] — CPU engine and registry-routed entry points.
//! - [`tensors`] — Dense tensor type.
//!
//! # Example
//!
//! ```rust
//! use array_dispatch::{catalog, ops::dispatch, value::Arg};
//!
//! let add = catalog::ufunc("add").unwrap();
//! let sum = dispatch::ufunc_call(add, vec![Arg::value(2.0f64), Arg::value(3.0f64)]).unwrap();
//! assert_eq!(sum.downcast_ref::<f64>(), Some(&5.0));
//! ```
//!
pub mod adapter;
pub mod backend;
pub mod catalog;
pub mod error;
pub mod ops;
pub mod registry;
pub mod tensors;
pub mod value;

pub use adapter::{EngineAdapter, NativeEngine, register_engine};
pub use backend::Backend;
pub use error::{DispatchError, EngineError, Result};
pub use registry::{Registry, RegistryBuilder};
pub use value::{Arg, Call, Outcome, Value};
