//! In-process table of contracts, implementation factories and compatible approaches.
//!
//! # Role
//!
//! Declarations only carry identifiers. The catalog maps those identifiers to code: contract
//! descriptors, constructors for implementations, and fallback strategies for operations added
//! to a contract after release.
//!
//! # Registration
//!
//! Entries are registered at runtime through the `register_*` methods, or at link time through
//! `inventory` (see [`crate::submit_implementation`] and friends) and gathered by
//! [`Catalog::from_inventory`].
//!
//! # Invariants
//!
//! - A key is registered at most once per catalog.
//!   - Enforced in: [`Catalog::register_contract`], [`Catalog::register_implementation`],
//!     [`Catalog::register_approach`]
//!   - Tested by: `tests::duplicate_keys_are_rejected`
//! - An approach is constructed at most once and shared by every proxy that uses it.
//!   - Enforced in: [`Catalog::approach`]
//!   - Tested by: `tests::approaches_are_memoized`

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::compat::{ApproachLookup, CompatibleApproach, NoopApproach, UnsupportedApproach};
use crate::contract::ContractDescriptor;
use crate::error::{BoxError, SpiError};
use crate::ids::{ApproachId, ContractId, ImplId, ScopeId};
use crate::properties::Properties;
use crate::service::Service;

/// Everything a factory knows about the instance it is asked to build.
pub struct Construction<'a> {
	pub contract: &'a ContractDescriptor,
	pub scope: &'a ScopeId,
	pub implementation: &'a ImplId,
	pub properties: &'a Properties,
}

/// Constructor of one implementation.
pub type Factory = Arc<dyn Fn(&Construction<'_>) -> Result<Arc<dyn Service>, BoxError> + Send + Sync>;

/// Constructor of one compatible approach.
pub type ApproachFactory = Arc<dyn Fn() -> Arc<dyn CompatibleApproach> + Send + Sync>;

/// Link-time contract registration.
pub struct ContractReg(pub fn() -> ContractDescriptor);

/// Link-time implementation registration.
pub struct ImplementationReg {
	pub contract: &'static str,
	pub implementation: &'static str,
	pub factory: fn(&Construction<'_>) -> Result<Arc<dyn Service>, BoxError>,
}

/// Link-time approach registration.
pub struct ApproachReg {
	pub id: &'static str,
	pub factory: fn() -> Arc<dyn CompatibleApproach>,
}

inventory::collect!(ContractReg);
inventory::collect!(ImplementationReg);
inventory::collect!(ApproachReg);

/// Approach ids every catalog built by [`Catalog::new`] knows.
pub const BUILTIN_APPROACHES: [&str; 2] = ["noop", "unsupported"];

fn noop_approach() -> Arc<dyn CompatibleApproach> {
	Arc::new(NoopApproach)
}

fn unsupported_approach() -> Arc<dyn CompatibleApproach> {
	Arc::new(UnsupportedApproach)
}

inventory::submit! {
	ApproachReg { id: "noop", factory: noop_approach }
}

inventory::submit! {
	ApproachReg { id: "unsupported", factory: unsupported_approach }
}

/// Shared registration table.
#[derive(Default)]
pub struct Catalog {
	contracts: RwLock<BTreeMap<ContractId, Arc<ContractDescriptor>>>,
	implementations: RwLock<FxHashMap<(ContractId, ImplId), Factory>>,
	approaches: RwLock<FxHashMap<ApproachId, ApproachFactory>>,
	approach_memo: RwLock<FxHashMap<ApproachId, Arc<dyn CompatibleApproach>>>,
}

impl Catalog {
	/// Creates a catalog holding only the built-in approaches.
	pub fn new() -> Self {
		let catalog = Self::empty();
		{
			let mut approaches = catalog.approaches.write();
			approaches.insert(ApproachId::from("noop"), Arc::new(noop_approach));
			approaches.insert(ApproachId::from("unsupported"), Arc::new(unsupported_approach));
		}
		catalog
	}

	/// Creates a catalog with no entries at all.
	pub fn empty() -> Self {
		Self::default()
	}

	/// Collects every `inventory`-submitted entry linked into the binary.
	///
	/// Duplicate submissions keep whichever the linker yielded first and are logged.
	pub fn from_inventory() -> Self {
		let catalog = Self::empty();

		for reg in inventory::iter::<ContractReg> {
			if let Err(err) = catalog.register_contract((reg.0)()) {
				tracing::warn!(error = %err, "ignoring inventory contract");
			}
		}
		for reg in inventory::iter::<ImplementationReg> {
			if let Err(err) = catalog.register_implementation(reg.contract, reg.implementation, reg.factory) {
				tracing::warn!(error = %err, "ignoring inventory implementation");
			}
		}
		for reg in inventory::iter::<ApproachReg> {
			if let Err(err) = catalog.register_approach(reg.id, reg.factory) {
				tracing::warn!(error = %err, "ignoring inventory approach");
			}
		}

		tracing::debug!(
			contracts = catalog.contracts.read().len(),
			implementations = catalog.implementations.read().len(),
			approaches = catalog.approaches.read().len(),
			"collected inventory catalog"
		);
		catalog
	}

	pub fn register_contract(&self, descriptor: ContractDescriptor) -> Result<(), SpiError> {
		let mut contracts = self.contracts.write();
		if contracts.contains_key(descriptor.id()) {
			return Err(SpiError::DuplicateRegistration {
				kind: "contract",
				key: Arc::from(descriptor.id().as_str()),
			});
		}
		contracts.insert(descriptor.id().clone(), Arc::new(descriptor));
		Ok(())
	}

	pub fn register_implementation<F>(&self, contract: impl Into<ContractId>, implementation: impl Into<ImplId>, factory: F) -> Result<(), SpiError>
	where
		F: Fn(&Construction<'_>) -> Result<Arc<dyn Service>, BoxError> + Send + Sync + 'static,
	{
		let key = (contract.into(), implementation.into());
		let mut implementations = self.implementations.write();
		if implementations.contains_key(&key) {
			return Err(SpiError::DuplicateRegistration {
				kind: "implementation",
				key: Arc::from(format!("{}/{}", key.0, key.1)),
			});
		}
		implementations.insert(key, Arc::new(factory));
		Ok(())
	}

	pub fn register_approach<F>(&self, id: impl Into<ApproachId>, factory: F) -> Result<(), SpiError>
	where
		F: Fn() -> Arc<dyn CompatibleApproach> + Send + Sync + 'static,
	{
		let id = id.into();
		let mut approaches = self.approaches.write();
		if approaches.contains_key(&id) {
			return Err(SpiError::DuplicateRegistration {
				kind: "approach",
				key: Arc::from(id.as_str()),
			});
		}
		approaches.insert(id, Arc::new(factory));
		Ok(())
	}

	pub fn contract(&self, id: &ContractId) -> Option<Arc<ContractDescriptor>> {
		self.contracts.read().get(id).cloned()
	}

	/// Returns every registered contract id, sorted.
	pub fn contract_ids(&self) -> Vec<ContractId> {
		self.contracts.read().keys().cloned().collect()
	}

	/// Contracts pinned to `scope` with [`ContractBuilder::required_in`], sorted.
	///
	/// [`ContractBuilder::required_in`]: crate::contract::ContractBuilder::required_in
	pub fn required_in(&self, scope: &ScopeId) -> Vec<ContractId> {
		self.contracts
			.read()
			.values()
			.filter(|descriptor| descriptor.is_required_in(scope))
			.map(|descriptor| descriptor.id().clone())
			.collect()
	}

	pub fn factory(&self, contract: &ContractId, implementation: &ImplId) -> Option<Factory> {
		self.implementations.read().get(&(contract.clone(), implementation.clone())).cloned()
	}

	pub fn has_approach(&self, id: &ApproachId) -> bool {
		self.approaches.read().contains_key(id)
	}
}

impl ApproachLookup for Catalog {
	/// Returns the shared approach instance, constructing it on first use.
	fn approach(&self, id: &ApproachId) -> Option<Arc<dyn CompatibleApproach>> {
		if let Some(approach) = self.approach_memo.read().get(id) {
			return Some(Arc::clone(approach));
		}

		let factory = self.approaches.read().get(id).cloned()?;
		// Built unlocked: a factory may consult the catalog itself. The first published wins.
		let built = factory();
		let mut memo = self.approach_memo.write();
		Some(Arc::clone(memo.entry(id.clone()).or_insert(built)))
	}
}

/// Submits an implementation factory for [`Catalog::from_inventory`].
///
/// ```ignore
/// spi_engine::submit_implementation!("acme.Codec", "acme.FastCodec", |_ctx| Ok(Arc::new(FastCodec)));
/// ```
#[macro_export]
macro_rules! submit_implementation {
	($contract:expr, $implementation:expr, $factory:expr $(,)?) => {
		$crate::inventory::submit! {
			$crate::catalog::ImplementationReg {
				contract: $contract,
				implementation: $implementation,
				factory: $factory,
			}
		}
	};
}

/// Submits a contract descriptor constructor for [`Catalog::from_inventory`].
#[macro_export]
macro_rules! submit_contract {
	($descriptor:expr $(,)?) => {
		$crate::inventory::submit! {
			$crate::catalog::ContractReg($descriptor)
		}
	};
}

/// Submits a compatible approach constructor for [`Catalog::from_inventory`].
#[macro_export]
macro_rules! submit_approach {
	($id:expr, $factory:expr $(,)?) => {
		$crate::inventory::submit! {
			$crate::catalog::ApproachReg {
				id: $id,
				factory: $factory,
			}
		}
	};
}
