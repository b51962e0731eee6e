//! Binds a native engine to the abstract catalog.
//!
//! # Engine Adapter
//!
//! Any engine implementing [`NativeEngine`] can be turned into a dispatch
//! [`Backend`]. The adapter:
//!
//! 1. builds a [`SelfResolutionTable`] mapping each catalog ufunc to the
//!    engine's counterpart of the same name, skipping names the engine lacks;
//! 2. binds the four ufunc facets through one trampoline each
//!    ([`EngineAdapter::replace_self`]);
//! 3. binds the constructors directly;
//! 4. registers the engine's conversion hook for [`NDARRAY`] wrappers.
//!
//! Every binding shares one compatibility predicate, [`compat_check`]: a call
//! is attempted only when each present argument, once unwrapped, is one of
//! the engine's native types.
//!
//! ## Example
//!
//! ```
//! use array_dispatch::adapter::register_engine;
//! use array_dispatch::ops::engine::CpuEngine;
//! use array_dispatch::registry::RegistryBuilder;
//!
//! let mut builder = RegistryBuilder::new();
//! register_engine(&mut builder, "cpu", CpuEngine::default());
//! let registry = builder.freeze();
//! assert_eq!(registry.backend_names(), vec!["cpu"]);
//! ```

use core::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::backend::{Backend, CompatCheck, Implementation};
use crate::catalog::{self, ARANGE, ARRAY, ASARRAY, NDARRAY, ONES, Ufunc, UfuncId, ZEROS};
use crate::catalog::{UFUNC_ACCUMULATE, UFUNC_CALL, UFUNC_REDUCE, UFUNC_TYPES};
use crate::error::EngineError;
use crate::registry::{BackendId, RegistryBuilder};
use crate::value::{Arg, Call, Outcome, Value};

/// A concrete computation engine the adapter can bind.
///
/// Engines are black boxes: the adapter only needs their native value
/// types, a by-name lookup of element-wise functions, and one entry point
/// per bound operation.
pub trait NativeEngine: Send + Sync + 'static {
    /// Primary native array type.
    type Array: Any + Send + Sync;
    /// Native scalar type.
    type Scalar: Any + Send + Sync;
    /// The engine's own element-wise function handle.
    type Ufunc: Send + Sync + 'static;

    /// Looks up the element-wise function called `name`.
    fn ufunc(&self, name: &str) -> Option<Self::Ufunc>;

    /// Applies `ufunc` to the call's arguments.
    fn call(&self, ufunc: &Self::Ufunc, call: &Call) -> Result<Value, EngineError>;

    /// Reduces the call's single argument with `ufunc`.
    fn reduce(&self, ufunc: &Self::Ufunc, call: &Call) -> Result<Value, EngineError>;

    /// Accumulates the call's single argument with `ufunc`.
    fn accumulate(&self, ufunc: &Self::Ufunc, call: &Call) -> Result<Value, EngineError>;

    /// Type signatures `ufunc` supports, e.g. `"dd->d"`.
    fn types(&self, ufunc: &Self::Ufunc) -> Vec<String>;

    fn arange(&self, call: &Call) -> Result<Value, EngineError>;
    fn array(&self, call: &Call) -> Result<Value, EngineError>;
    fn zeros(&self, call: &Call) -> Result<Value, EngineError>;
    fn ones(&self, call: &Call) -> Result<Value, EngineError>;
    fn asarray(&self, call: &Call) -> Result<Value, EngineError>;

    /// Coerces an arbitrary value into a native array.
    fn convert(&self, value: &Value) -> Result<Value, EngineError>;
}

/// Returns `true` if `value` is one of `E`'s native types.
pub fn is_native<E: NativeEngine>(value: &Value) -> bool {
    value.is::<E::Array>() || value.is::<E::Scalar>()
}

/// Compatibility predicate shared by every binding of an `E` backend.
///
/// Wrapped arguments are judged by their inner value and absent arguments
/// are ignored, so an empty argument list is compatible.
pub fn compat_check<E: NativeEngine>(args: &[Arg]) -> bool {
    args.iter()
        .filter_map(Arg::unwrapped)
        .all(is_native::<E>)
}

/// Maps catalog ufuncs to an engine's counterparts.
///
/// Built once; a missing entry means the engine does not provide that ufunc.
pub struct SelfResolutionTable<E: NativeEngine> {
    entries: HashMap<UfuncId, E::Ufunc>,
}

impl<E: NativeEngine> SelfResolutionTable<E> {
    /// Resolves every ufunc in `ufuncs` by name against `engine`.
    pub fn build<'a>(engine: &E, ufuncs: impl IntoIterator<Item = &'a Ufunc>) -> Self {
        let mut entries = HashMap::new();
        for ufunc in ufuncs {
            match engine.ufunc(ufunc.name()) {
                Some(native) => {
                    entries.insert(ufunc.id(), native);
                }
                None => trace!(ufunc = ufunc.name(), "engine has no counterpart"),
            }
        }
        Self { entries }
    }

    /// The engine counterpart of `ufunc`, if it has one.
    pub fn resolve(&self, ufunc: &Ufunc) -> Option<&E::Ufunc> {
        self.entries.get(&ufunc.id())
    }

    pub fn contains(&self, ufunc: &Ufunc) -> bool {
        self.entries.contains_key(&ufunc.id())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One engine together with its resolution table.
pub struct EngineAdapter<E: NativeEngine> {
    engine: Arc<E>,
    table: Arc<SelfResolutionTable<E>>,
}

impl<E: NativeEngine> Clone for EngineAdapter<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            table: Arc::clone(&self.table),
        }
    }
}

impl<E: NativeEngine> EngineAdapter<E> {
    /// Wraps `engine`, resolving the whole catalog.
    pub fn new(engine: E) -> Self {
        Self::with_ufuncs(engine, catalog::ufuncs())
    }

    /// Wraps `engine`, resolving only `ufuncs`.
    pub fn with_ufuncs<'a>(engine: E, ufuncs: impl IntoIterator<Item = &'a Ufunc>) -> Self {
        let table = SelfResolutionTable::build(&engine, ufuncs);
        Self {
            engine: Arc::new(engine),
            table: Arc::new(table),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn table(&self) -> &SelfResolutionTable<E> {
        &self.table
    }

    /// Builds a facet implementation from `f(engine, native_ufunc, call)`.
    ///
    /// The implementation resolves the call's receiver through the table.
    /// A missing receiver or table entry yields `Unhandled`; otherwise `f`'s
    /// result or error is passed through unchanged.
    pub fn replace_self<F>(&self, f: F) -> Implementation
    where
        F: Fn(&E, &E::Ufunc, &Call) -> Result<Value, EngineError> + Send + Sync + 'static,
    {
        let engine = Arc::clone(&self.engine);
        let table = Arc::clone(&self.table);
        Arc::new(move |call: &Call| {
            let Some(native) = call.receiver.as_ref().and_then(|r| table.resolve(r)) else {
                return Ok(Outcome::Unhandled);
            };
            f(&engine, native, call).map(Outcome::Handled)
        })
    }

    /// Builds an implementation that forwards straight to `f(engine, call)`.
    pub fn direct<F>(&self, f: F) -> Implementation
    where
        F: Fn(&E, &Call) -> Result<Value, EngineError> + Send + Sync + 'static,
    {
        let engine = Arc::clone(&self.engine);
        Arc::new(move |call: &Call| f(&engine, call).map(Outcome::Handled))
    }

    fn compat() -> CompatCheck {
        Arc::new(compat_check::<E>)
    }

    /// Binds the call, reduce, accumulate and types facets.
    pub fn bind_facets(&self, backend: &mut Backend) {
        backend.bind(&UFUNC_CALL, Self::compat()).to_shared(self.replace_self(E::call));
        backend.bind(&UFUNC_REDUCE, Self::compat()).to_shared(self.replace_self(E::reduce));
        backend
            .bind(&UFUNC_ACCUMULATE, Self::compat())
            .to_shared(self.replace_self(E::accumulate));
        backend
            .bind(&UFUNC_TYPES, Self::compat())
            .to_shared(self.replace_self(|engine: &E, ufunc: &E::Ufunc, _: &Call| {
                Ok(Value::new(engine.types(ufunc)))
            }));
    }

    /// Binds the array constructors.
    pub fn bind_constructors(&self, backend: &mut Backend) {
        backend.bind(&ARANGE, Self::compat()).to_shared(self.direct(E::arange));
        backend.bind(&ARRAY, Self::compat()).to_shared(self.direct(E::array));
        backend.bind(&ZEROS, Self::compat()).to_shared(self.direct(E::zeros));
        backend.bind(&ONES, Self::compat()).to_shared(self.direct(E::ones));
        backend.bind(&ASARRAY, Self::compat()).to_shared(self.direct(E::asarray));
    }

    /// Registers the engine's conversion hook for array wrappers.
    pub fn register_convertor(&self, backend: &mut Backend) {
        let engine = Arc::clone(&self.engine);
        backend.register_convertor(&NDARRAY, move |value: &Value| engine.convert(value));
    }

    /// Performs every binding on `backend`.
    pub fn install(&self, backend: &mut Backend) {
        self.bind_facets(backend);
        self.bind_constructors(backend);
        self.register_convertor(backend);
        debug!(
            backend = backend.name(),
            ufuncs = self.table.len(),
            bindings = backend.len(),
            "engine bound"
        );
    }
}

/// Builds a backend named `name` for `engine` and declares it.
pub fn register_engine<E: NativeEngine>(
    builder: &mut RegistryBuilder,
    name: &str,
    engine: E,
) -> BackendId {
    let mut backend = Backend::new(name);
    EngineAdapter::new(engine).install(&mut backend);
    builder.declare(backend)
}
