//! Backend handles and their binding tables.
//!
//! A [`Backend`] is built once during initialization: bindings are added
//! with [`bind`], the conversion hook with [`Backend::register_convertor`].
//! Once the owning registry is frozen the backend is only read.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use array_dispatch::backend::{Backend, bind};
//! use array_dispatch::catalog::Multimethod;
//! use array_dispatch::value::{Arg, Call, Outcome, Value};
//!
//! let answer = Multimethod::new("answer");
//! let mut backend = Backend::new("demo");
//! bind(&mut backend, &answer, Arc::new(|_: &[Arg]| true))
//!     .to(|_| Ok(Outcome::Handled(Value::new(42i64))));
//!
//! let out = backend.try_call(&answer, &Call::default()).unwrap();
//! assert_eq!(out.handled().and_then(|v| v.downcast_ref::<i64>().copied()), Some(42));
//! ```

use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::catalog::{Multimethod, OpId};
use crate::error::{DispatchError, EngineError};
use crate::value::{Arg, Call, DispatchType, Dispatchable, Outcome, Value};

/// A concrete callable bound to one multimethod.
pub type Implementation = Arc<dyn Fn(&Call) -> Result<Outcome<Value>, EngineError> + Send + Sync>;

/// Backend-scoped predicate deciding whether a call may be attempted.
pub type CompatCheck = Arc<dyn Fn(&[Arg]) -> bool + Send + Sync>;

/// Turns a wrapped value into the backend's native representation.
pub type Convertor = Arc<dyn Fn(&Value) -> Result<Value, EngineError> + Send + Sync>;

struct Binding {
    op: Multimethod,
    implementation: Implementation,
}

struct ConversionHook {
    dispatch_type: DispatchType,
    convert: Convertor,
}

/// A registered provider of concrete implementations.
pub struct Backend {
    name: String,
    bindings: HashMap<OpId, Binding>,
    compat: Option<CompatCheck>,
    convertor: Option<ConversionHook>,
}

impl Backend {
    /// Creates a backend with an empty binding table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bindings: HashMap::new(),
            compat: None,
            convertor: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Starts binding `op`, installing `compat` as this backend's predicate.
    pub fn bind(&mut self, op: &Multimethod, compat: CompatCheck) -> Binder<'_> {
        Binder {
            backend: self,
            op: op.clone(),
            compat,
        }
    }

    /// Returns `true` if `op` has a binding.
    pub fn supports(&self, op: &Multimethod) -> bool {
        self.bindings.contains_key(&op.id())
    }

    /// The implementation bound to `op`, if any.
    pub fn implementation(&self, op: &Multimethod) -> Option<&Implementation> {
        self.bindings.get(&op.id()).map(|b| &b.implementation)
    }

    /// Number of bound multimethods.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Names of bound multimethods, sorted.
    pub fn bound_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.bindings.values().map(|b| b.op.name()).collect();
        names.sort_unstable();
        names
    }

    /// Runs the backend's predicate over `args`.
    ///
    /// A backend without a predicate has nothing bound and accepts anything.
    pub fn is_compatible(&self, args: &[Arg]) -> bool {
        self.compat.as_ref().is_none_or(|compat| compat(args))
    }

    /// Installs the conversion hook, replacing any earlier one.
    pub fn register_convertor<F>(&mut self, dispatch_type: &DispatchType, convert: F)
    where
        F: Fn(&Value) -> Result<Value, EngineError> + Send + Sync + 'static,
    {
        debug!(
            backend = %self.name,
            dispatch_type = dispatch_type.name(),
            "registering convertor"
        );
        self.convertor = Some(ConversionHook {
            dispatch_type: dispatch_type.clone(),
            convert: Arc::new(convert),
        });
    }

    pub fn has_convertor(&self) -> bool {
        self.convertor.is_some()
    }

    /// Converts a wrapped value into this backend's native representation.
    ///
    /// Returns `Unhandled` when no hook is installed for the wrapper's
    /// dispatch type. A failing hook is an error, not a fallback.
    pub fn convert(&self, wrapped: &Dispatchable) -> Result<Outcome<Value>, EngineError> {
        match &self.convertor {
            Some(hook) if hook.dispatch_type == *wrapped.dispatch_type() => {
                (hook.convert)(wrapped.value()).map(Outcome::Handled)
            }
            _ => Ok(Outcome::Unhandled),
        }
    }

    /// Replaces wrapped arguments by their converted (or unwrapped) values.
    fn materialize(&self, call: &Call) -> Result<Call, DispatchError> {
        let mut args = Vec::with_capacity(call.args.len());
        for (index, arg) in call.args.iter().enumerate() {
            let arg = match arg {
                Arg::Dispatchable(wrapped) => match self.convert(wrapped) {
                    Ok(Outcome::Handled(native)) => Arg::Value(native),
                    Ok(Outcome::Unhandled) => Arg::Value(wrapped.value().clone()),
                    Err(source) => {
                        return Err(DispatchError::Conversion {
                            backend: self.name.clone(),
                            index,
                            source,
                        });
                    }
                },
                other => other.clone(),
            };
            args.push(arg);
        }
        Ok(Call {
            receiver: call.receiver.clone(),
            args,
            params: call.params.clone(),
        })
    }

    /// Attempts `call` on this backend.
    ///
    /// `Unhandled` when `op` is not bound, the predicate rejects the
    /// arguments, or the implementation declines. Engine and conversion
    /// failures are returned as errors.
    pub fn try_call(&self, op: &Multimethod, call: &Call) -> Result<Outcome<Value>, DispatchError> {
        let Some(implementation) = self.implementation(op) else {
            return Ok(Outcome::Unhandled);
        };
        if !self.is_compatible(&call.args) {
            trace!(
                backend = %self.name,
                op = op.name(),
                "arguments rejected by compatibility check"
            );
            return Ok(Outcome::Unhandled);
        }
        let call = self.materialize(call)?;
        implementation(&call).map_err(|source| DispatchError::Engine {
            backend: self.name.clone(),
            source,
        })
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("name", &self.name)
            .field("bindings", &self.bound_names())
            .field("convertor", &self.convertor.as_ref().map(|h| h.dispatch_type.name()))
            .finish()
    }
}

/// Pending binding of one multimethod, completed by [`Binder::to`].
pub struct Binder<'a> {
    backend: &'a mut Backend,
    op: Multimethod,
    compat: CompatCheck,
}

impl Binder<'_> {
    /// Records `implementation` as the binding, overwriting any earlier one.
    pub fn to<F>(self, implementation: F)
    where
        F: Fn(&Call) -> Result<Outcome<Value>, EngineError> + Send + Sync + 'static,
    {
        self.to_shared(Arc::new(implementation));
    }

    /// Same as [`Binder::to`] for an already shared implementation.
    pub fn to_shared(self, implementation: Implementation) {
        let backend = self.backend;
        backend.compat = Some(self.compat);
        let replaced = backend
            .bindings
            .insert(
                self.op.id(),
                Binding {
                    op: self.op.clone(),
                    implementation,
                },
            )
            .is_some();
        debug!(backend = %backend.name, op = self.op.name(), replaced, "bound implementation");
    }
}

/// Starts binding `op` on `backend` with `compat` as the backend's predicate.
pub fn bind<'a>(backend: &'a mut Backend, op: &Multimethod, compat: CompatCheck) -> Binder<'a> {
    backend.bind(op, compat)
}
