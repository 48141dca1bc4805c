//! Built-in compatible approaches.

use super::CompatibleApproach;
use crate::contract::{ContractDescriptor, OperationDescriptor};
use crate::service::{InvokeError, Service, Value};

/// Answers every call with `null`. Registered as `noop`.
pub struct NoopApproach;

impl CompatibleApproach for NoopApproach {
	fn invoke(&self, _contract: &ContractDescriptor, _raw: &dyn Service, _op: &OperationDescriptor, _args: &[Value]) -> Result<Value, InvokeError> {
		Ok(Value::Null)
	}
}

/// Rejects every call. Registered as `unsupported`.
pub struct UnsupportedApproach;

impl CompatibleApproach for UnsupportedApproach {
	fn invoke(&self, _contract: &ContractDescriptor, _raw: &dyn Service, op: &OperationDescriptor, _args: &[Value]) -> Result<Value, InvokeError> {
		Err(InvokeError::Unsupported(op.signature.clone()))
	}
}
