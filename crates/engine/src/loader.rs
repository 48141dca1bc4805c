//! Per-`(contract, scope)` discovery and instantiation unit.
//!
//! # Role
//!
//! A [`Loader`] drives the pipeline for one contract in one scope: list declarations, parse,
//! resolve, construct, wrap for compatibility, run `on_created`. Each stage is published once
//! and read lock-free afterwards. A failed stage publishes nothing and is retried on the next
//! call.
//!
//! # Invariants
//!
//! - Resolution stages never construct instances.
//!   - Enforced in: [`Loader::single`], [`Loader::multiple`]
//! - Names resolving to the same implementation share one instance.
//!   - Enforced in: [`Loader::get_multiple`]
//!   - Tested by: `tests::names_sharing_an_implementation_share_an_instance`
//! - An instance is published only after `on_created` succeeded.
//!   - Enforced in: `Loader::instantiate`
//!   - Tested by: `tests::on_created_failure_is_an_instantiation_error`
//! - A torn-down loader never constructs again, so every `on_created` is paired with one
//!   `on_teardown`.
//!   - Enforced in: `Loader::teardown`, `Loader::ensure_live`
//!   - Tested by: `tests::retired_loader_refuses_to_instantiate`

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::catalog::{Catalog, Construction};
use crate::compat::{self, CompatTarget};
use crate::config::{OriginOrder, SpiConfig};
use crate::contract::{Cardinality, ContractDescriptor};
use crate::def::{DefinitionSet, PropertiesDefinition};
use crate::error::SpiError;
use crate::ids::{ContractId, ImplId, ScopeId};
use crate::parse::parse_all;
use crate::properties::Properties;
use crate::resolve::{MultiRegistry, SingleResolution, resolve_multiple, resolve_single};
use crate::service::Service;
use crate::source::DeclarationSource;
use crate::sync::PublishOnce;

/// Collaborators shared by every loader of a registry.
pub(crate) struct Environment {
	pub(crate) source: Arc<dyn DeclarationSource>,
	pub(crate) catalog: Arc<Catalog>,
	pub(crate) config: SpiConfig,
}

/// Instantiated entries of a multi-entry contract, in resolved order.
pub struct MultiInstances {
	registry: Arc<MultiRegistry>,
	instances: Arc<[Arc<dyn Service>]>,
}

impl MultiInstances {
	/// Returns the instance registered under `name`.
	pub fn get(&self, name: &str) -> Option<&Arc<dyn Service>> {
		self.registry.position(name).map(|idx| &self.instances[idx])
	}

	/// Returns every instance, sorted by rank.
	pub fn all(&self) -> &[Arc<dyn Service>] {
		&self.instances
	}

	pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
		self.registry.names()
	}

	/// Pairs each name with its instance, in resolved order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Service>)> + '_ {
		self.registry.names().zip(self.instances.iter())
	}

	/// The resolved definitions backing these instances.
	pub fn registry(&self) -> &MultiRegistry {
		&self.registry
	}

	pub fn len(&self) -> usize {
		self.instances.len()
	}

	pub fn is_empty(&self) -> bool {
		self.instances.is_empty()
	}
}

/// Memoized pipeline for one contract in one scope.
pub struct Loader {
	env: Arc<Environment>,
	contract: Arc<ContractDescriptor>,
	scope: ScopeId,
	definitions: PublishOnce<DefinitionSet>,
	single: PublishOnce<SingleResolution>,
	multiple: PublishOnce<MultiRegistry>,
	single_instance: PublishOnce<Arc<dyn Service>>,
	multi_instances: PublishOnce<MultiInstances>,
	retired: AtomicBool,
}

impl Loader {
	pub(crate) fn new(env: Arc<Environment>, contract: Arc<ContractDescriptor>, scope: ScopeId) -> Self {
		Self {
			env,
			contract,
			scope,
			definitions: PublishOnce::default(),
			single: PublishOnce::default(),
			multiple: PublishOnce::default(),
			single_instance: PublishOnce::default(),
			multi_instances: PublishOnce::default(),
			retired: AtomicBool::new(false),
		}
	}

	pub fn contract(&self) -> &ContractDescriptor {
		&self.contract
	}

	pub fn scope(&self) -> &ScopeId {
		&self.scope
	}

	fn id(&self) -> &ContractId {
		self.contract.id()
	}

	fn check_cardinality(&self, requested: Cardinality) -> Result<(), SpiError> {
		if self.contract.cardinality() == requested {
			return Ok(());
		}
		Err(SpiError::CardinalityMismatch {
			contract: self.id().clone(),
			declared: self.contract.cardinality(),
			requested,
		})
	}

	/// Whether the registry has torn this loader down. A retired loader still resolves but never
	/// instantiates.
	pub fn is_retired(&self) -> bool {
		self.retired.load(Ordering::Acquire)
	}

	/// Checked under the instance cells' init locks, which teardown also takes.
	fn ensure_live(&self) -> Result<(), SpiError> {
		if !self.is_retired() {
			return Ok(());
		}
		Err(SpiError::Retired {
			contract: self.id().clone(),
			scope: self.scope.clone(),
		})
	}

	/// Returns the raw definitions of this contract, in origin load order.
	pub fn definitions(&self) -> Result<Arc<DefinitionSet>, SpiError> {
		self.definitions.get_or_try_init(|| self.discover())
	}

	fn discover(&self) -> Result<DefinitionSet, SpiError> {
		let mut decls = self.env.source.list(self.id(), &self.scope).map_err(|source| SpiError::Source {
			scope: self.scope.clone(),
			source,
		})?;
		if self.env.config.origin_order == OriginOrder::Lexical {
			decls.sort_by(|a, b| a.origin.cmp(&b.origin));
		}

		let set = parse_all(self.id(), &self.scope, &decls)?;
		let wrong_shape = match self.contract.cardinality() {
			Cardinality::Single => (!set.multiples.is_empty()).then_some(Cardinality::Multiple),
			Cardinality::Multiple => (!set.singles.is_empty()).then_some(Cardinality::Single),
		};
		if let Some(requested) = wrong_shape {
			return Err(SpiError::CardinalityMismatch {
				contract: self.id().clone(),
				declared: self.contract.cardinality(),
				requested,
			});
		}

		tracing::debug!(
			contract = %self.id(),
			scope = %self.scope,
			documents = decls.len(),
			definitions = set.len(),
			"discovered definitions"
		);
		Ok(set)
	}

	/// Resolves the single-mode winner.
	pub fn single(&self) -> Result<Arc<SingleResolution>, SpiError> {
		self.check_cardinality(Cardinality::Single)?;
		self.single.get_or_try_init(|| {
			let defs = self.definitions()?;
			resolve_single(self.id(), &self.scope, &defs.singles)
		})
	}

	/// Resolves the multi-mode registry.
	pub fn multiple(&self) -> Result<Arc<MultiRegistry>, SpiError> {
		self.check_cardinality(Cardinality::Multiple)?;
		self.multiple.get_or_try_init(|| {
			let defs = self.definitions()?;
			Ok::<_, SpiError>(resolve_multiple(self.id(), &self.scope, &defs.multiples))
		})
	}

	/// Returns the instance of the single-mode winner.
	pub fn get_single(&self) -> Result<Arc<dyn Service>, SpiError> {
		let published = self.single_instance.get_or_try_init(|| {
			self.ensure_live()?;
			let resolution = self.single()?;
			let defs = self.definitions()?;
			self.instantiate(resolution.winner.implementation(), &defs.properties)
		})?;
		Ok(Arc::clone(&*published))
	}

	/// Like [`Loader::get_single`], but `Ok(None)` when nothing is declared.
	pub fn get_optional_single(&self) -> Result<Option<Arc<dyn Service>>, SpiError> {
		self.check_cardinality(Cardinality::Single)?;
		if self.definitions()?.singles.is_empty() {
			return Ok(None);
		}
		self.get_single().map(Some)
	}

	/// Instantiates every enabled entry.
	///
	/// Every entry is attempted; failures are reported together.
	pub fn get_multiple(&self) -> Result<Arc<MultiInstances>, SpiError> {
		self.multi_instances.get_or_try_init(|| {
			self.ensure_live()?;
			let registry = self.multiple()?;
			let defs = self.definitions()?;

			let mut built: FxHashMap<ImplId, Arc<dyn Service>> = FxHashMap::default();
			let mut failed: FxHashSet<ImplId> = FxHashSet::default();
			let mut instances = Vec::with_capacity(registry.len());
			let mut errors = Vec::new();

			for entry in registry.all() {
				let implementation = entry.implementation();
				if let Some(service) = built.get(implementation) {
					instances.push(Arc::clone(service));
					continue;
				}
				if failed.contains(implementation) {
					continue;
				}
				match self.instantiate(implementation, &defs.properties) {
					Ok(service) => {
						built.insert(implementation.clone(), Arc::clone(&service));
						instances.push(service);
					}
					Err(err) => {
						failed.insert(implementation.clone());
						errors.push(err);
					}
				}
			}

			if let Some(err) = SpiError::from_many(errors) {
				self.teardown_services(built.values());
				return Err(err);
			}

			Ok(MultiInstances {
				registry,
				instances: Arc::from(instances),
			})
		})
	}

	/// Forces the stage matching the contract's cardinality.
	pub fn preload(&self) -> Result<(), SpiError> {
		match self.contract.cardinality() {
			Cardinality::Single if self.contract.is_optional() => self.get_optional_single().map(drop),
			Cardinality::Single => self.get_single().map(drop),
			Cardinality::Multiple => self.get_multiple().map(drop),
		}
	}

	fn instantiate(&self, implementation: &ImplId, properties: &[PropertiesDefinition]) -> Result<Arc<dyn Service>, SpiError> {
		let contract = self.id();
		let factory = self.env.catalog.factory(contract, implementation).ok_or_else(|| {
			SpiError::instantiation(contract, &self.scope, implementation, format!("no factory registered for {implementation}"))
		})?;

		let properties = Properties::merge_for(implementation, properties);
		let raw = factory(&Construction {
			contract: &self.contract,
			scope: &self.scope,
			implementation,
			properties: &properties,
		})
		.map_err(|err| SpiError::instantiation(contract, &self.scope, implementation, err))?;

		let target = CompatTarget {
			contract: &self.contract,
			scope: &self.scope,
			implementation,
		};
		let service = compat::build(target, raw, self.env.catalog.as_ref())?;

		if let Some(lifecycle) = service.lifecycle() {
			lifecycle
				.on_created()
				.map_err(|err| SpiError::instantiation(contract, &self.scope, implementation, err))?;
		}

		tracing::debug!(
			contract = %contract,
			scope = %self.scope,
			implementation = %implementation,
			proxied = service.compat_proxy().is_some(),
			properties = properties.len(),
			"instantiated implementation"
		);
		Ok(service)
	}

	/// Retires the loader, unpublishes every instance and runs `on_teardown` on each distinct
	/// one.
	///
	/// The flag is raised before the cells are taken: an initializer already holding a cell's
	/// lock publishes and is then taken here, any later one sees the flag.
	pub(crate) fn teardown(&self) {
		self.retired.store(true, Ordering::Release);
		let single = self.single_instance.take();
		let multi = self.multi_instances.take();

		let services = single.iter().map(|s| &**s).chain(multi.iter().flat_map(|m| m.instances.iter()));
		self.teardown_services(services);
	}

	fn teardown_services<'a>(&self, services: impl Iterator<Item = &'a Arc<dyn Service>>) {
		let mut seen: FxHashSet<*const ()> = FxHashSet::default();
		for service in services {
			if !seen.insert(Arc::as_ptr(service).cast::<()>()) {
				continue;
			}
			let Some(lifecycle) = service.lifecycle() else {
				continue;
			};
			if let Err(err) = lifecycle.on_teardown() {
				tracing::warn!(
					contract = %self.id(),
					scope = %self.scope,
					error = %err,
					"teardown hook failed"
				);
			}
		}
	}
}
