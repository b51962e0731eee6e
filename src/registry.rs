//! Backend registry and dispatcher.
//!
//! Registration happens on a mutable [`RegistryBuilder`]. Calling
//! [`RegistryBuilder::freeze`] produces an immutable [`Registry`] that can be
//! shared freely between threads, and optionally installed once as the
//! process-wide registry.
//!
//! # Example
//!
//! ```
//! use array_dispatch::registry::RegistryBuilder;
//! use array_dispatch::catalog::{self, UFUNC_CALL};
//! use array_dispatch::value::{Arg, Call};
//!
//! let registry = RegistryBuilder::with_cpu().freeze();
//! let add = catalog::ufunc("add").unwrap();
//! let call = Call::new(vec![Arg::value(2.0f64), Arg::value(3.0f64)]).through(add);
//! let sum = registry.dispatch(&UFUNC_CALL, &call).unwrap();
//! assert_eq!(sum.downcast_ref::<f64>(), Some(&5.0));
//! ```

use core::fmt;
use std::sync::{Arc, OnceLock};

use tracing::{debug, trace};

use crate::backend::Backend;
use crate::catalog::Multimethod;
use crate::error::{DispatchError, Result};
use crate::value::{Call, Outcome, Value};

/// Position of a declared backend in its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendId(usize);

/// Mutable registry used during initialization.
#[derive(Default)]
pub struct RegistryBuilder {
    backends: Vec<Backend>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    /// Creates a builder with only the CPU backend declared.
    pub fn with_cpu() -> Self {
        let mut builder = Self::new();
        let engine = crate::ops::engine::CpuEngine::default();
        crate::adapter::register_engine(&mut builder, "cpu", engine);
        builder
    }

    /// Declares `backend`, making it a dispatch candidate.
    ///
    /// Backends are tried in declaration order. Declaring a name that is
    /// already present replaces that backend in place.
    pub fn declare(&mut self, backend: Backend) -> BackendId {
        if let Some(index) = self.backends.iter().position(|b| b.name() == backend.name()) {
            debug!(backend = backend.name(), "replacing declared backend");
            self.backends[index] = backend;
            return BackendId(index);
        }
        debug!(backend = backend.name(), bindings = backend.len(), "declared backend");
        self.backends.push(backend);
        BackendId(self.backends.len() - 1)
    }

    /// Mutable access to a declared backend, for late bindings.
    pub fn backend_mut(&mut self, id: BackendId) -> Option<&mut Backend> {
        self.backends.get_mut(id.0)
    }

    /// Returns the declared backend with the given name.
    pub fn get(&self, name: &str) -> Option<&Backend> {
        self.backends.iter().find(|b| b.name() == name)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Ends initialization.
    pub fn freeze(self) -> Registry {
        Registry {
            backends: self.backends.into_iter().map(Arc::new).collect(),
        }
    }
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("backends", &self.backends.iter().map(Backend::name).collect::<Vec<_>>())
            .finish()
    }
}

/// Immutable registry consulted at call time.
#[derive(Clone)]
pub struct Registry {
    backends: Vec<Arc<Backend>>,
}

impl Registry {
    /// Returns the backend with the given name.
    pub fn get(&self, name: &str) -> Option<&Arc<Backend>> {
        self.backends.iter().find(|b| b.name() == name)
    }

    /// Backends in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Backend>> {
        self.backends.iter()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Returns backend names for debugging.
    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Backends that bind `op`, in declaration order.
    pub fn candidates<'a>(
        &'a self,
        op: &'a Multimethod,
    ) -> impl Iterator<Item = &'a Arc<Backend>> + 'a {
        self.backends.iter().filter(move |b| b.supports(op))
    }

    /// Runs `call` on the first backend that handles it.
    ///
    /// Backends that reject the arguments or decline the call are skipped.
    /// The first genuine failure stops the search and is returned.
    pub fn dispatch(&self, op: &Multimethod, call: &Call) -> Result<Value> {
        for backend in self.candidates(op) {
            match backend.try_call(op, call)? {
                Outcome::Handled(value) => {
                    trace!(backend = backend.name(), op = op.name(), "call handled");
                    return Ok(value);
                }
                Outcome::Unhandled => {
                    trace!(
                        backend = backend.name(),
                        op = op.name(),
                        "call not handled, trying next backend"
                    );
                }
            }
        }
        debug!(op = op.name(), "no backend handled call");
        Err(DispatchError::NoImplementation(op.name().to_string()))
    }

    /// Publishes this registry process-wide.
    ///
    /// Only the first installation succeeds.
    pub fn install(self) -> Result<&'static Registry> {
        let mut ours = false;
        let installed = GLOBAL.get_or_init(|| {
            ours = true;
            self
        });
        if !ours {
            return Err(DispatchError::AlreadyInstalled);
        }
        debug!(backends = ?installed.backend_names(), "installed global registry");
        Ok(installed)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("backends", &self.backend_names())
            .finish()
    }
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// The installed process-wide registry, if any.
pub fn global() -> Option<&'static Registry> {
    GLOBAL.get()
}

/// The process-wide registry, installing the CPU-only default if needed.
pub fn global_or_default() -> &'static Registry {
    GLOBAL.get_or_init(|| {
        debug!("installing default registry");
        RegistryBuilder::with_cpu().freeze()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CompatCheck, bind};
    use crate::error::EngineError;
    use crate::value::Arg;

    fn accept_all() -> CompatCheck {
        Arc::new(|_: &[Arg]| true)
    }

    fn backend_returning(name: &str, op: &Multimethod, outcome: Option<i64>) -> Backend {
        let mut backend = Backend::new(name);
        bind(&mut backend, op, accept_all()).to(move |_: &Call| {
            Ok(match outcome {
                Some(n) => Outcome::Handled(Value::new(n)),
                None => Outcome::Unhandled,
            })
        });
        backend
    }

    #[test]
    fn test_builder_new() {
        let builder = RegistryBuilder::new();
        assert!(builder.is_empty());
        assert!(builder.freeze().is_empty());
    }

    #[test]
    fn test_builder_with_cpu() {
        let registry = RegistryBuilder::with_cpu().freeze();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("cpu").is_some());
    }

    #[test]
    fn test_declare_replaces_same_name() {
        let op = Multimethod::new("op");
        let mut builder = RegistryBuilder::new();
        let first = builder.declare(backend_returning("a", &op, Some(1)));
        builder.declare(backend_returning("b", &op, Some(2)));
        let again = builder.declare(backend_returning("a", &op, Some(3)));
        assert_eq!(first, again);

        let registry = builder.freeze();
        assert_eq!(registry.backend_names(), vec!["a", "b"]);
        let value = registry.dispatch(&op, &Call::default()).unwrap();
        assert_eq!(value.downcast_ref::<i64>(), Some(&3));
    }

    #[test]
    fn test_dispatch_falls_through_unhandled() {
        let op = Multimethod::new("op");
        let mut builder = RegistryBuilder::new();
        builder.declare(backend_returning("declines", &op, None));
        builder.declare(backend_returning("handles", &op, Some(7)));
        let registry = builder.freeze();

        let value = registry.dispatch(&op, &Call::default()).unwrap();
        assert_eq!(value.downcast_ref::<i64>(), Some(&7));
    }

    #[test]
    fn test_dispatch_skips_rejecting_backend() {
        let op = Multimethod::new("op");
        let mut picky = Backend::new("picky");
        bind(&mut picky, &op, Arc::new(|args: &[Arg]| args.is_empty()))
            .to(|_| Ok(Outcome::Handled(Value::new(1i64))));

        let mut builder = RegistryBuilder::new();
        builder.declare(picky);
        builder.declare(backend_returning("lenient", &op, Some(2)));
        let registry = builder.freeze();

        let call = Call::new(vec![Arg::value(0.5f64)]);
        let value = registry.dispatch(&op, &call).unwrap();
        assert_eq!(value.downcast_ref::<i64>(), Some(&2));
        let value = registry.dispatch(&op, &Call::default()).unwrap();
        assert_eq!(value.downcast_ref::<i64>(), Some(&1));
    }

    #[test]
    fn test_dispatch_error_stops_search() {
        let op = Multimethod::new("op");
        let mut failing = Backend::new("failing");
        bind(&mut failing, &op, accept_all())
            .to(|_| Err(EngineError::InvalidArgument("bad".into())));

        let mut builder = RegistryBuilder::new();
        builder.declare(failing);
        builder.declare(backend_returning("fallback", &op, Some(2)));
        let registry = builder.freeze();

        let err = registry.dispatch(&op, &Call::default()).unwrap_err();
        assert!(matches!(err, DispatchError::Engine { ref backend, .. } if backend == "failing"));
    }

    #[test]
    fn test_dispatch_without_candidates() {
        let op = Multimethod::new("lonely");
        let registry = RegistryBuilder::new().freeze();
        assert_eq!(
            registry.dispatch(&op, &Call::default()).unwrap_err(),
            DispatchError::NoImplementation("lonely".into())
        );
    }

    #[test]
    fn test_bind_after_declare() {
        let op = Multimethod::new("late");
        let mut builder = RegistryBuilder::new();
        let id = builder.declare(Backend::new("late"));
        bind(builder.backend_mut(id).unwrap(), &op, accept_all())
            .to(|_| Ok(Outcome::Handled(Value::new(9i64))));

        let registry = builder.freeze();
        let value = registry.dispatch(&op, &Call::default()).unwrap();
        assert_eq!(value.downcast_ref::<i64>(), Some(&9));
    }

    #[test]
    fn test_registry_debug() {
        let registry = RegistryBuilder::with_cpu().freeze();
        let debug_str = format!("{:?}", registry);
        assert!(debug_str.contains("cpu"));
    }
}
