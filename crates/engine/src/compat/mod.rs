//! Compatibility proxies for implementations built against an older contract.
//!
//! # Mental Model
//!
//! A contract may gain operations after release. Each added operation names a
//! [`CompatibleApproach`] that answers calls on behalf of implementations that predate it.
//! [`build`] checks an instance against the full operation set:
//!
//! 1. **Complete:** the raw instance is returned unchanged (same `Arc`).
//! 2. **Old:** a [`CompatProxy`] routes the missing added operations to their approaches and
//!    everything else to the raw instance.
//! 3. **Broken:** an operation that was never added-later is missing, or an added operation
//!    has no usable approach. Construction fails, so preload reports it before first call.
//!
//! # Invariants
//!
//! - A fallback operation never reaches the raw instance.
//!   - Enforced in: [`CompatProxy::invoke`]
//!   - Tested by: `tests::test_fallback_never_reaches_raw`
//! - Approaches are looked up once per unimplemented operation, at build time.
//!   - Enforced in: [`build`]

mod approaches;

use std::sync::Arc;

pub use approaches::{NoopApproach, UnsupportedApproach};
use rustc_hash::FxHashMap;

use crate::contract::{ContractDescriptor, OperationDescriptor, Signature};
use crate::error::SpiError;
use crate::ids::{ApproachId, ImplId, ScopeId};
use crate::service::{InvokeError, Lifecycle, Service, Value};

/// Fallback strategy for an operation the raw instance does not implement.
pub trait CompatibleApproach: Send + Sync {
	/// Handles a call to `op` on behalf of `raw`.
	fn invoke(&self, contract: &ContractDescriptor, raw: &dyn Service, op: &OperationDescriptor, args: &[Value]) -> Result<Value, InvokeError>;
}

impl<F> CompatibleApproach for F
where
	F: Fn(&ContractDescriptor, &dyn Service, &OperationDescriptor, &[Value]) -> Result<Value, InvokeError> + Send + Sync,
{
	fn invoke(&self, contract: &ContractDescriptor, raw: &dyn Service, op: &OperationDescriptor, args: &[Value]) -> Result<Value, InvokeError> {
		self(contract, raw, op, args)
	}
}

/// Resolves approach ids to strategy instances.
pub trait ApproachLookup {
	fn approach(&self, id: &ApproachId) -> Option<Arc<dyn CompatibleApproach>>;
}

impl ApproachLookup for FxHashMap<ApproachId, Arc<dyn CompatibleApproach>> {
	fn approach(&self, id: &ApproachId) -> Option<Arc<dyn CompatibleApproach>> {
		self.get(id).cloned()
	}
}

/// Identity of the instance being checked, for error context.
#[derive(Clone, Copy)]
pub struct CompatTarget<'a> {
	pub contract: &'a Arc<ContractDescriptor>,
	pub scope: &'a ScopeId,
	pub implementation: &'a ImplId,
}

/// Checks `raw` against the contract and wraps it in a proxy if it predates added operations.
pub fn build(target: CompatTarget<'_>, raw: Arc<dyn Service>, approaches: &dyn ApproachLookup) -> Result<Arc<dyn Service>, SpiError> {
	let contract = target.contract;
	let mut fallbacks: FxHashMap<Signature, Arc<dyn CompatibleApproach>> = FxHashMap::default();
	let mut errors = Vec::new();

	for op in contract.operations() {
		if raw.implements(&op.signature) {
			continue;
		}

		if !op.is_added() {
			errors.push(SpiError::UnimplementedOperation {
				contract: contract.id().clone(),
				scope: target.scope.clone(),
				implementation: target.implementation.clone(),
				operation: op.signature.clone(),
			});
			continue;
		}

		match op.approach().and_then(|id| approaches.approach(id)) {
			Some(approach) => {
				fallbacks.insert(op.signature.clone(), approach);
			}
			None => errors.push(SpiError::MissingCompatibleApproach {
				contract: contract.id().clone(),
				scope: target.scope.clone(),
				implementation: target.implementation.clone(),
				operation: op.signature.clone(),
				approach: op.approach().cloned(),
			}),
		}
	}

	if let Some(err) = SpiError::from_many(errors) {
		return Err(err);
	}

	if fallbacks.is_empty() {
		return Ok(raw);
	}

	tracing::debug!(
		contract = %contract.id(),
		scope = %target.scope,
		implementation = %target.implementation,
		fallbacks = fallbacks.len(),
		"wrapping implementation in compatibility proxy"
	);

	Ok(Arc::new(CompatProxy {
		contract: Arc::clone(contract),
		implementation: target.implementation.clone(),
		raw,
		fallbacks,
	}))
}

/// Proxy satisfying a contract's full operation set on behalf of an older implementation.
pub struct CompatProxy {
	contract: Arc<ContractDescriptor>,
	implementation: ImplId,
	raw: Arc<dyn Service>,
	fallbacks: FxHashMap<Signature, Arc<dyn CompatibleApproach>>,
}

impl CompatProxy {
	/// Returns the wrapped raw instance.
	pub fn raw(&self) -> &Arc<dyn Service> {
		&self.raw
	}

	pub fn contract(&self) -> &ContractDescriptor {
		&self.contract
	}

	pub fn implementation(&self) -> &ImplId {
		&self.implementation
	}

	/// Returns true if calls to `op` are answered by a fallback.
	pub fn is_fallback(&self, op: &Signature) -> bool {
		self.fallbacks.contains_key(op)
	}

	/// Returns the fallback-routed operations in contract order.
	pub fn fallback_operations(&self) -> impl Iterator<Item = &Signature> + '_ {
		self.contract
			.operations()
			.iter()
			.map(|op| &op.signature)
			.filter(|sig| self.fallbacks.contains_key(*sig))
	}
}

impl Service for CompatProxy {
	fn implements(&self, op: &Signature) -> bool {
		self.contract.has_operation(op)
	}

	fn invoke(&self, op: &Signature, args: &[Value]) -> Result<Value, InvokeError> {
		let Some(descriptor) = self.contract.operation(op) else {
			return Err(InvokeError::Unsupported(op.clone()));
		};
		if args.len() != op.arity() {
			return Err(InvokeError::Arity {
				op: op.clone(),
				expected: op.arity(),
				got: args.len(),
			});
		}

		match self.fallbacks.get(op) {
			Some(approach) => approach.invoke(&self.contract, self.raw.as_ref(), descriptor, args),
			None => self.raw.invoke(op, args),
		}
	}

	fn lifecycle(&self) -> Option<&dyn Lifecycle> {
		self.raw.lifecycle()
	}

	fn compat_proxy(&self) -> Option<&CompatProxy> {
		Some(self)
	}
}

#[cfg(test)]
mod tests;
