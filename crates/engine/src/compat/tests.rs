use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;

use super::*;
use crate::contract::Cardinality;
use crate::error::BoxError;
use crate::service::str_arg;

fn sig(s: &str) -> Signature {
	Signature::parse(s).unwrap()
}

fn greeter(approach: Option<&str>) -> Arc<ContractDescriptor> {
	Arc::new(
		ContractDescriptor::builder("acme.Greeter", Cardinality::Single)
			.operation("greet(String)")
			.added_operation("wave()", approach)
			.build()
			.unwrap(),
	)
}

fn lookup() -> FxHashMap<ApproachId, Arc<dyn CompatibleApproach>> {
	let mut map: FxHashMap<ApproachId, Arc<dyn CompatibleApproach>> = FxHashMap::default();
	map.insert("noop".into(), Arc::new(NoopApproach));
	map.insert("unsupported".into(), Arc::new(UnsupportedApproach));
	map
}

fn target<'a>(contract: &'a Arc<ContractDescriptor>, scope: &'a ScopeId, implementation: &'a ImplId) -> CompatTarget<'a> {
	CompatTarget {
		contract,
		scope,
		implementation,
	}
}

/// Counts raw calls; panics on any operation it never implemented.
#[derive(Default)]
struct OldGreeter {
	calls: AtomicUsize,
	torn_down: AtomicUsize,
}

impl Lifecycle for OldGreeter {
	fn on_teardown(&self) -> Result<(), BoxError> {
		self.torn_down.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}

impl Service for OldGreeter {
	fn implements(&self, op: &Signature) -> bool {
		op.as_str() == "greet(String)"
	}

	fn invoke(&self, op: &Signature, args: &[Value]) -> Result<Value, InvokeError> {
		assert_eq!(op.as_str(), "greet(String)", "raw instance reached with {op}");
		self.calls.fetch_add(1, Ordering::SeqCst);
		Ok(json!(format!("hello {}", str_arg(op, args, 0)?)))
	}

	fn lifecycle(&self) -> Option<&dyn Lifecycle> {
		Some(self)
	}
}

struct FullGreeter;

impl Service for FullGreeter {
	fn implements(&self, _op: &Signature) -> bool {
		true
	}

	fn invoke(&self, _op: &Signature, _args: &[Value]) -> Result<Value, InvokeError> {
		Ok(json!("full"))
	}
}

/// A complete implementation comes back as the very same `Arc`.
#[test]
fn test_complete_implementation_passes_through() {
	let contract = greeter(Some("noop"));
	let (scope, implementation) = (ScopeId::from("app"), ImplId::from("acme.Full"));
	let raw: Arc<dyn Service> = Arc::new(FullGreeter);

	let built = build(target(&contract, &scope, &implementation), Arc::clone(&raw), &lookup()).unwrap();
	assert!(Arc::ptr_eq(&raw, &built));
	assert!(built.compat_proxy().is_none());
}

#[test]
fn test_fallback_never_reaches_raw() {
	let contract = greeter(Some("noop"));
	let (scope, implementation) = (ScopeId::from("app"), ImplId::from("acme.Old"));
	let old = Arc::new(OldGreeter::default());

	let built = build(target(&contract, &scope, &implementation), old.clone(), &lookup()).unwrap();
	let proxy = built.compat_proxy().expect("old implementation is proxied");
	assert!(proxy.is_fallback(&sig("wave()")));
	assert!(!proxy.is_fallback(&sig("greet(String)")));
	assert_eq!(proxy.fallback_operations().map(Signature::as_str).collect::<Vec<_>>(), ["wave()"]);
	assert_eq!(proxy.implementation().as_str(), "acme.Old");

	assert_eq!(built.invoke(&sig("wave()"), &[]).unwrap(), Value::Null);
	assert_eq!(old.calls.load(Ordering::SeqCst), 0);

	assert_eq!(built.invoke(&sig("greet(String)"), &[json!("bob")]).unwrap(), json!("hello bob"));
	assert_eq!(old.calls.load(Ordering::SeqCst), 1);

	assert!(built.implements(&sig("wave()")));
	assert!(!built.implements(&sig("shout(String)")));
}

/// The pass-through marker gives access to the raw instance behind a proxy.
#[test]
fn test_proxy_exposes_raw_instance() {
	let contract = greeter(Some("noop"));
	let (scope, implementation) = (ScopeId::from("app"), ImplId::from("acme.Old"));
	let old: Arc<dyn Service> = Arc::new(OldGreeter::default());

	let built = build(target(&contract, &scope, &implementation), Arc::clone(&old), &lookup()).unwrap();
	let raw = built.compat_proxy().unwrap().raw();
	assert!(Arc::ptr_eq(raw, &old));
	assert!(raw.downcast_ref::<OldGreeter>().is_some());
	assert!(built.downcast_ref::<OldGreeter>().is_none());
}

#[test]
fn test_missing_approach_fails_build() {
	let contract = greeter(None);
	let (scope, implementation) = (ScopeId::from("app"), ImplId::from("acme.Old"));
	let err = match build(target(&contract, &scope, &implementation), Arc::new(OldGreeter::default()), &lookup()) {
		Err(err) => err,
		Ok(_) => panic!("build must fail without an approach"),
	};
	let SpiError::MissingCompatibleApproach { operation, approach, implementation, .. } = err else {
		panic!("expected a missing approach error");
	};
	assert_eq!(operation.as_str(), "wave()");
	assert!(approach.is_none());
	assert_eq!(implementation.as_str(), "acme.Old");
}

/// An approach id the lookup cannot resolve counts as missing.
#[test]
fn test_unregistered_approach_fails_build() {
	let contract = greeter(Some("retry-later"));
	let (scope, implementation) = (ScopeId::from("app"), ImplId::from("acme.Old"));
	let result = build(target(&contract, &scope, &implementation), Arc::new(OldGreeter::default()), &lookup());
	assert!(matches!(result, Err(SpiError::MissingCompatibleApproach { approach: Some(_), .. })));
}

/// A missing original operation is a broken implementation, not an old one.
#[test]
fn test_missing_original_operation_is_unimplemented() {
	struct Mute;
	impl Service for Mute {
		fn implements(&self, _op: &Signature) -> bool {
			false
		}
		fn invoke(&self, op: &Signature, _args: &[Value]) -> Result<Value, InvokeError> {
			Err(InvokeError::Unsupported(op.clone()))
		}
	}

	let contract = greeter(Some("noop"));
	let (scope, implementation) = (ScopeId::from("app"), ImplId::from("acme.Mute"));
	let result = build(target(&contract, &scope, &implementation), Arc::new(Mute), &lookup());
	assert!(matches!(result, Err(SpiError::UnimplementedOperation { .. })));
}

/// Every broken operation is reported, not just the first.
#[test]
fn test_all_missing_operations_reported() {
	let contract = Arc::new(
		ContractDescriptor::builder("acme.Greeter", Cardinality::Single)
			.operation("greet(String)")
			.added_operation("wave()", None)
			.added_operation("bow()", Some("nowhere"))
			.build()
			.unwrap(),
	);
	let (scope, implementation) = (ScopeId::from("app"), ImplId::from("acme.Old"));
	let err = match build(target(&contract, &scope, &implementation), Arc::new(OldGreeter::default()), &lookup()) {
		Err(err) => err,
		Ok(_) => panic!("build must fail"),
	};
	assert_eq!(err.flatten().len(), 2);
}

#[test]
fn test_proxy_checks_membership_and_arity() {
	let contract = greeter(Some("unsupported"));
	let (scope, implementation) = (ScopeId::from("app"), ImplId::from("acme.Old"));
	let built = build(target(&contract, &scope, &implementation), Arc::new(OldGreeter::default()), &lookup()).unwrap();

	assert!(matches!(built.invoke(&sig("shout(String)"), &[json!("x")]), Err(InvokeError::Unsupported(_))));
	assert!(matches!(
		built.invoke(&sig("greet(String)"), &[]),
		Err(InvokeError::Arity { expected: 1, got: 0, .. })
	));
	// The `unsupported` approach propagates its own failure unchanged.
	assert!(matches!(built.invoke(&sig("wave()"), &[]), Err(InvokeError::Unsupported(op)) if op.as_str() == "wave()"));
}

#[test]
fn test_proxy_delegates_lifecycle() {
	let contract = greeter(Some("noop"));
	let (scope, implementation) = (ScopeId::from("app"), ImplId::from("acme.Old"));
	let old = Arc::new(OldGreeter::default());
	let built = build(target(&contract, &scope, &implementation), old.clone(), &lookup()).unwrap();

	built.lifecycle().expect("raw lifecycle is visible").on_teardown().unwrap();
	assert_eq!(old.torn_down.load(Ordering::SeqCst), 1);
}

/// Closures serve as approaches.
#[test]
fn test_closure_approach_receives_call_context() {
	let contract = greeter(Some("echo-op"));
	let (scope, implementation) = (ScopeId::from("app"), ImplId::from("acme.Old"));
	let mut approaches = lookup();
	approaches.insert(
		"echo-op".into(),
		Arc::new(
			|contract: &ContractDescriptor, _raw: &dyn Service, op: &OperationDescriptor, _args: &[Value]| -> Result<Value, InvokeError> {
				Ok(json!(format!("{}::{}", contract.id(), op.signature)))
			},
		),
	);

	let built = build(target(&contract, &scope, &implementation), Arc::new(OldGreeter::default()), &approaches).unwrap();
	assert_eq!(built.invoke(&sig("wave()"), &[]).unwrap(), json!("acme.Greeter::wave()"));
}
