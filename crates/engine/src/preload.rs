//! Eager verification of a scope.
//!
//! # Role
//!
//! [`Registry::preload`] forces every contract of a scope through resolution and instantiation and
//! collects every failure instead of stopping at the first. [`Registry::checksum`] fingerprints the
//! resolved configuration of a scope so two deployments can be compared.
//!
//! # Invariants
//!
//! - Preload reports every failing contract.
//!   - Enforced in: `preload`
//!   - Tested by: `tests::report_collects_every_failure`
//! - A scope covers the contracts it declares, those pinned to it with
//!   [`crate::contract::ContractBuilder::required_in`] and those it has already loaded. Other
//!   catalog contracts are left alone.
//!   - Enforced in: `scope_contracts`, `preload`
//!   - Tested by: `tests::unrelated_contracts_are_not_checked`
//! - The checksum never reads the loader cache.
//!   - Enforced in: `checksum` (detached loaders)
//!   - Tested by: `tests::checksum_sees_changes_behind_the_cache`
//! - Origin identifiers do not contribute to the checksum.
//!   - Tested by: `tests::checksum_ignores_origin_names`
//! - The checksum does not depend on the host's word size or endianness.
//!   - Enforced in: `Digest`
//!   - Tested by: `tests::checksum_is_pinned_across_hosts`

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::contract::Cardinality;
use crate::error::SpiError;
use crate::ids::{ContractId, ScopeId};
use crate::loader::{Environment, Loader};
use crate::registry::Registry;

/// Outcome of [`Registry::preload`].
#[derive(Debug, Clone)]
pub struct PreloadReport {
	pub scope: ScopeId,
	/// Contracts that resolved and instantiated cleanly, sorted.
	pub loaded: Vec<ContractId>,
	/// Every failure, flattened.
	pub errors: Vec<SpiError>,
}

impl PreloadReport {
	pub fn succeeded(&self) -> bool {
		self.errors.is_empty()
	}

	pub fn into_result(self) -> (bool, Vec<SpiError>) {
		(self.errors.is_empty(), self.errors)
	}

	/// Collapses the report into one error, [`SpiError::Aggregate`] when there are several.
	pub fn ensure(self) -> Result<Vec<ContractId>, SpiError> {
		match SpiError::from_many(self.errors) {
			Some(err) => Err(err),
			None => Ok(self.loaded),
		}
	}
}

/// Contracts declared in `scope` plus catalog contracts pinned to it, sorted.
fn scope_contracts(env: &Environment, scope: &ScopeId) -> Result<BTreeSet<ContractId>, SpiError> {
	let declared = env.source.contracts(scope).map_err(|source| SpiError::Source {
		scope: scope.clone(),
		source,
	})?;
	let mut contracts: BTreeSet<ContractId> = declared.into_iter().collect();
	contracts.extend(env.catalog.required_in(scope));
	Ok(contracts)
}

pub(crate) fn preload(registry: &Registry, scope: &ScopeId) -> PreloadReport {
	let mut report = PreloadReport {
		scope: scope.clone(),
		loaded: Vec::new(),
		errors: Vec::new(),
	};

	let mut contracts = match scope_contracts(registry.environment(), scope) {
		Ok(contracts) => contracts,
		Err(err) => {
			report.errors.push(err);
			registry.catalog().required_in(scope).into_iter().collect()
		}
	};
	// Contracts the scope already uses are verified too.
	contracts.extend(registry.cached_contracts(scope));

	for contract in contracts {
		match registry.loader(contract.clone(), scope.clone()).and_then(|loader| loader.preload()) {
			Ok(()) => report.loaded.push(contract),
			Err(err) => report.errors.extend(err.flatten()),
		}
	}

	for err in &report.errors {
		tracing::warn!(scope = %scope, error = %err, "preload failure");
	}
	tracing::info!(
		scope = %scope,
		loaded = report.loaded.len(),
		failed = report.errors.len(),
		"preloaded scope"
	);
	report
}

/// Field-separated writer over BLAKE3. Integers are fed little-endian, so the value is the
/// same on every host.
struct Digest(blake3::Hasher);

impl Digest {
	const END: u8 = 0xff;

	fn new() -> Self {
		Self(blake3::Hasher::new())
	}

	fn text(&mut self, value: &str) {
		self.0.update(value.as_bytes());
		self.0.update(&[Self::END]);
	}

	fn int(&mut self, value: i64) {
		self.0.update(&value.to_le_bytes());
	}

	fn tag(&mut self, value: u8) {
		self.0.update(&[value]);
	}

	/// The first eight bytes of the hash, little-endian.
	fn finish(&self) -> u64 {
		let hash = self.0.finalize();
		let mut head = [0u8; 8];
		head.copy_from_slice(&hash.as_bytes()[..8]);
		u64::from_le_bytes(head)
	}
}

pub(crate) fn checksum(env: &Arc<Environment>, scope: &ScopeId) -> Result<u64, SpiError> {
	let mut digest = Digest::new();

	for contract in scope_contracts(env, scope)? {
		let descriptor = env
			.catalog
			.contract(&contract)
			.ok_or_else(|| SpiError::UnknownContract { contract: contract.clone() })?;
		let loader = Loader::new(Arc::clone(env), descriptor, scope.clone());
		let defs = loader.definitions()?;

		digest.text(contract.as_str());
		digest.text(&loader.contract().cardinality().to_string());

		match loader.contract().cardinality() {
			Cardinality::Single if defs.singles.is_empty() => digest.tag(0),
			Cardinality::Single => {
				let resolution = loader.single()?;
				digest.tag(1);
				digest.text(resolution.winner.implementation().as_str());
				for candidate in &resolution.candidates {
					digest.text(candidate.implementation().as_str());
					digest.int(candidate.priority);
				}
			}
			Cardinality::Multiple => {
				let registry = loader.multiple()?;
				digest.tag(2);
				for entry in registry.all() {
					digest.text(&entry.name);
					digest.text(entry.implementation().as_str());
					digest.int(entry.rank);
				}
				digest.tag(3);
				for entry in registry.disabled() {
					digest.text(&entry.name);
					digest.text(entry.implementation().as_str());
					digest.int(entry.rank);
				}
				digest.tag(4);
				for record in registry.overrides() {
					digest.text(&record.name);
					digest.text(record.shadowed.implementation().as_str());
					digest.int(record.shadowed.rank);
					digest.tag(u8::from(record.shadowed.disabled));
				}
			}
		}

		digest.tag(5);
		for bundle in &defs.properties {
			digest.text(bundle.implementation().as_str());
			digest.int(bundle.priority);
			for (key, value) in &bundle.properties {
				digest.text(key);
				digest.text(value);
			}
			digest.tag(Digest::END);
		}
	}

	let sum = digest.finish();
	tracing::debug!(scope = %scope, checksum = %format!("{sum:016x}"), "computed checksum");
	Ok(sum)
}
