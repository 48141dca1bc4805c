//! Dynamic service surface.
//!
//! Resolved instances are `Arc<dyn Service>`. Operations are dispatched by [`Signature`] with
//! [`Value`] arguments, which lets the compatibility proxy stand in for any contract without
//! generated code. Typed callers reach the concrete type through `downcast_ref` on `dyn Service`.

use std::any::Any;

use crate::compat::CompatProxy;
use crate::contract::Signature;
use crate::error::BoxError;

/// Dynamic argument and return type of operations.
pub type Value = serde_json::Value;

/// Error returned by an operation call.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
	#[error("operation {0} is not supported")]
	Unsupported(Signature),
	#[error("{op} expects {expected} arguments, got {got}")]
	Arity { op: Signature, expected: usize, got: usize },
	#[error("{op}: argument {index} is invalid: {message}")]
	InvalidArgument { op: Signature, index: usize, message: String },
	#[error("{op} failed: {source}")]
	Failed {
		op: Signature,
		#[source]
		source: BoxError,
	},
}

impl InvokeError {
	pub fn failed(op: &Signature, source: impl Into<BoxError>) -> Self {
		Self::Failed {
			op: op.clone(),
			source: source.into(),
		}
	}
}

/// Optional creation and teardown hooks.
pub trait Lifecycle {
	/// Called once after construction, before the instance is published.
	fn on_created(&self) -> Result<(), BoxError> {
		Ok(())
	}

	/// Called best-effort when the owning scope is invalidated.
	fn on_teardown(&self) -> Result<(), BoxError> {
		Ok(())
	}
}

/// A resolved contract implementation.
pub trait Service: Any + Send + Sync {
	/// Returns true if this concrete type implements `op`.
	fn implements(&self, op: &Signature) -> bool;

	/// Invokes `op` with `args`.
	fn invoke(&self, op: &Signature, args: &[Value]) -> Result<Value, InvokeError>;

	/// Exposes lifecycle hooks, if the type has any.
	fn lifecycle(&self) -> Option<&dyn Lifecycle> {
		None
	}

	/// Returns the proxy view when this instance is a compatibility proxy.
	fn compat_proxy(&self) -> Option<&CompatProxy> {
		None
	}
}

impl dyn Service {
	/// Downcasts to the concrete implementation type.
	///
	/// A compatibility proxy is not its raw instance; go through [`CompatProxy::raw`] first.
	pub fn downcast_ref<T: Service>(&self) -> Option<&T> {
		(self as &dyn Any).downcast_ref::<T>()
	}
}

/// Returns argument `index` as a string, or an [`InvokeError::InvalidArgument`].
pub fn str_arg<'a>(op: &Signature, args: &'a [Value], index: usize) -> Result<&'a str, InvokeError> {
	match args.get(index) {
		Some(Value::String(s)) => Ok(s),
		Some(other) => Err(InvokeError::InvalidArgument {
			op: op.clone(),
			index,
			message: format!("expected string, got {other}"),
		}),
		None => Err(InvokeError::Arity {
			op: op.clone(),
			expected: op.arity(),
			got: args.len(),
		}),
	}
}
