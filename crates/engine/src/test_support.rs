//! Shared fixtures for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;

use crate::catalog::{Catalog, Construction};
use crate::contract::{Cardinality, ContractDescriptor, Signature};
use crate::error::{BoxError, SpiError};
use crate::registry::Registry;
use crate::service::{InvokeError, Lifecycle, Service, Value};
use crate::source::MemorySource;

pub(crate) const SCOPE: &str = "app";
pub(crate) const CODEC: &str = "acme.Codec";
pub(crate) const FILTER: &str = "acme.Filter";

#[derive(Default)]
pub(crate) struct Counters {
	pub built: AtomicUsize,
	pub created: AtomicUsize,
	pub torn_down: AtomicUsize,
}

impl Counters {
	pub fn built(&self) -> usize {
		self.built.load(Ordering::SeqCst)
	}

	pub fn created(&self) -> usize {
		self.created.load(Ordering::SeqCst)
	}

	pub fn torn_down(&self) -> usize {
		self.torn_down.load(Ordering::SeqCst)
	}
}

/// Answers every operation with its label.
pub(crate) struct Tracked {
	pub label: String,
	counters: Arc<Counters>,
}

impl Lifecycle for Tracked {
	fn on_created(&self) -> Result<(), BoxError> {
		self.counters.created.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}

	fn on_teardown(&self) -> Result<(), BoxError> {
		self.counters.torn_down.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}

impl Service for Tracked {
	fn implements(&self, _op: &Signature) -> bool {
		true
	}

	fn invoke(&self, _op: &Signature, _args: &[Value]) -> Result<Value, InvokeError> {
		Ok(json!(self.label))
	}

	fn lifecycle(&self) -> Option<&dyn Lifecycle> {
		Some(self)
	}
}

pub(crate) fn codec(optional: bool) -> ContractDescriptor {
	ContractDescriptor::builder(CODEC, Cardinality::Single)
		.optional(optional)
		.operation("encode(String)")
		.build()
		.unwrap()
}

pub(crate) fn filter() -> ContractDescriptor {
	ContractDescriptor::builder(FILTER, Cardinality::Multiple)
		.operation("apply(String)")
		.build()
		.unwrap()
}

/// Catalog with the codec and filter contracts and tracked implementations of both.
///
/// A `label` property overrides the label of the built instance.
pub(crate) fn catalog(counters: &Arc<Counters>) -> Catalog {
	let catalog = Catalog::new();
	catalog.register_contract(codec(false)).unwrap();
	catalog.register_contract(filter()).unwrap();

	let implementations = [(CODEC, "acme.Fast"), (CODEC, "acme.Slow"), (FILTER, "acme.Audit"), (FILTER, "acme.Trim")];
	for (contract, implementation) in implementations {
		let counters = Arc::clone(counters);
		catalog
			.register_implementation(contract, implementation, move |ctx: &Construction<'_>| {
				counters.built.fetch_add(1, Ordering::SeqCst);
				let label = ctx.properties.get("label").unwrap_or(ctx.implementation.as_str()).to_string();
				Ok(Arc::new(Tracked {
					label,
					counters: Arc::clone(&counters),
				}) as Arc<dyn Service>)
			})
			.unwrap();
	}
	catalog
}

pub(crate) fn registry(source: MemorySource, counters: &Arc<Counters>) -> Registry {
	Registry::builder().source(source).catalog(catalog(counters)).build()
}

pub(crate) fn single_doc(implementation: &str, priority: i64) -> String {
	format!("[[single]]\nimplementation = \"{implementation}\"\npriority = {priority}\n")
}

pub(crate) fn multiple_doc(name: &str, implementation: &str, rank: i64, disabled: bool) -> String {
	format!("[[multiple]]\nname = \"{name}\"\nimplementation = \"{implementation}\"\nrank = {rank}\ndisabled = {disabled}\n")
}

pub(crate) fn label_of(service: &Arc<dyn Service>) -> String {
	let op = Signature::parse("encode(String)").unwrap();
	match service.invoke(&op, &[json!("x")]) {
		Ok(Value::String(label)) => label,
		other => panic!("unexpected invoke result: {other:?}"),
	}
}

/// Unwraps the error of a result whose success type has no `Debug`.
pub(crate) fn expect_err<T>(result: Result<T, SpiError>) -> SpiError {
	match result {
		Err(err) => err,
		Ok(_) => panic!("expected an error"),
	}
}
