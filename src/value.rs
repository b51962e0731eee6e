//! Values crossing the dispatch boundary.
//!
//! Dispatch is type-erased: a [`Value`] can hold anything, and each backend
//! decides for itself which concrete types it accepts. Arguments that should
//! be unwrapped before native use arrive as [`Dispatchable`] wrappers.

use core::any::{Any, type_name};
use core::fmt;
use std::sync::Arc;

use crate::catalog::{Ufunc, fresh_id};

/// A cheaply clonable, type-erased value.
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Value {
    /// Wraps any sendable value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Returns `true` if the held value is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Borrows the held value as a `T`, if it is one.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Name of the concrete type held, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if both values share the same allocation.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value<{}>", self.type_name)
    }
}

/// Marks the kind of wrapper a dispatchable value arrived as.
///
/// Compared by identity: two dispatch types with the same name are distinct.
#[derive(Clone, Debug)]
pub struct DispatchType {
    id: u64,
    name: &'static str,
}

impl DispatchType {
    /// Creates a new, distinct dispatch type.
    pub fn new(name: &'static str) -> Self {
        Self {
            id: fresh_id(),
            name,
        }
    }

    /// Display name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for DispatchType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DispatchType {}

/// A value marked as participating in dispatch.
#[derive(Clone, Debug)]
pub struct Dispatchable {
    value: Value,
    dispatch_type: DispatchType,
}

impl Dispatchable {
    pub fn new(value: Value, dispatch_type: DispatchType) -> Self {
        Self {
            value,
            dispatch_type,
        }
    }

    /// The wrapped value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn dispatch_type(&self) -> &DispatchType {
        &self.dispatch_type
    }

    /// Consumes the wrapper, returning the inner value.
    pub fn into_inner(self) -> Value {
        self.value
    }
}

/// One positional argument of a call.
#[derive(Clone, Debug)]
pub enum Arg {
    /// The "not supplied" sentinel.
    Absent,
    /// A plain value.
    Value(Value),
    /// A value wrapped for dispatch.
    Dispatchable(Dispatchable),
}

impl Arg {
    /// Wraps any value as a plain argument.
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Arg::Value(Value::new(value))
    }

    /// Wraps any value as a dispatchable argument of `dispatch_type`.
    pub fn dispatchable<T: Any + Send + Sync>(value: T, dispatch_type: &DispatchType) -> Self {
        Arg::Dispatchable(Dispatchable::new(Value::new(value), dispatch_type.clone()))
    }

    /// The value a backend sees after unwrapping, or `None` when absent.
    pub fn unwrapped(&self) -> Option<&Value> {
        match self {
            Arg::Absent => None,
            Arg::Value(value) => Some(value),
            Arg::Dispatchable(wrapped) => Some(wrapped.value()),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Arg::Absent)
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}

impl From<Dispatchable> for Arg {
    fn from(wrapped: Dispatchable) -> Self {
        Arg::Dispatchable(wrapped)
    }
}

/// Non-dispatchable parameters of a call.
///
/// These are never inspected by compatibility predicates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params {
    pub axis: Option<usize>,
    pub shape: Option<Vec<usize>>,
    pub dtype: Option<String>,
}

impl Params {
    pub fn axis(mut self, axis: usize) -> Self {
        self.axis = Some(axis);
        self
    }

    pub fn shape(mut self, shape: impl Into<Vec<usize>>) -> Self {
        self.shape = Some(shape.into());
        self
    }

    pub fn dtype(mut self, dtype: impl Into<String>) -> Self {
        self.dtype = Some(dtype.into());
        self
    }
}

/// A complete invocation of a multimethod.
#[derive(Clone, Debug, Default)]
pub struct Call {
    /// Structured operation the call was made through, for facet calls.
    pub receiver: Option<Ufunc>,
    /// Positional arguments, as received.
    pub args: Vec<Arg>,
    pub params: Params,
}

impl Call {
    pub fn new(args: impl Into<Vec<Arg>>) -> Self {
        Self {
            receiver: None,
            args: args.into(),
            params: Params::default(),
        }
    }

    /// Sets the structured operation this call goes through.
    pub fn through(mut self, ufunc: &Ufunc) -> Self {
        self.receiver = Some(ufunc.clone());
        self
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

/// Result of asking one backend to service a call.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome<T> {
    /// The backend ran the call.
    Handled(T),
    /// The backend does not implement this call; try the next one.
    Unhandled,
}

impl<T> Outcome<T> {
    pub fn is_handled(&self) -> bool {
        matches!(self, Outcome::Handled(_))
    }

    /// Converts into an `Option`, dropping the distinction's name.
    pub fn handled(self) -> Option<T> {
        match self {
            Outcome::Handled(value) => Some(value),
            Outcome::Unhandled => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Handled(value) => Outcome::Handled(f(value)),
            Outcome::Unhandled => Outcome::Unhandled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_downcast() {
        let v = Value::new(3.0f64);
        assert!(v.is::<f64>());
        assert!(!v.is::<f32>());
        assert_eq!(v.downcast_ref::<f64>(), Some(&3.0));
        assert_eq!(v.type_name(), "f64");
    }

    #[test]
    fn test_dispatch_type_identity() {
        let a = DispatchType::new("ndarray");
        let b = DispatchType::new("ndarray");
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_arg_unwrapped() {
        let kind = DispatchType::new("ndarray");
        assert!(Arg::Absent.unwrapped().is_none());
        let plain = Arg::value(1.0f64);
        assert!(plain.unwrapped().is_some_and(|v| v.is::<f64>()));
        let wrapped = Arg::dispatchable("foreign", &kind);
        assert!(wrapped.unwrapped().is_some_and(|v| v.is::<&str>()));
    }

    #[test]
    fn test_outcome_map() {
        let handled: Outcome<i32> = Outcome::Handled(2);
        assert_eq!(handled.map(|x| x * 2), Outcome::Handled(4));
        let unhandled: Outcome<i32> = Outcome::Unhandled;
        assert_eq!(unhandled.clone().map(|x| x * 2), Outcome::Unhandled);
        assert_eq!(unhandled.handled(), None);
    }
}
