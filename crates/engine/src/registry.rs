//! Loader cache with atomic publication.
//!
//! # Role
//!
//! The [`Registry`] is the consumer entrypoint. It hands out one [`Loader`] per
//! `(contract, scope)` and drops them again on invalidation.
//!
//! # Invariants
//!
//! - Concurrent `loader()` calls for one key yield the same `Arc<Loader>`.
//!   - Enforced in: [`Registry::loader`] (lock-free read, then double check under the writer lock)
//!   - Tested by: `tests::concurrent_loader_calls_share_one_loader`
//! - Readers observe either the whole map before an invalidation or the whole map after it.
//!   - Enforced in: [`Registry::invalidate`], [`Registry::invalidate_all`] (single `store`)
//! - Teardown runs after the swap, so a reader never receives an instance being torn down.
//!   - Enforced in: `Registry::retire`
//!   - Tested by: `tests::invalidation_tears_down_and_rediscovers`

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::catalog::Catalog;
use crate::config::SpiConfig;
use crate::error::SpiError;
use crate::ids::{ContractId, ScopeId};
use crate::loader::{Environment, Loader, MultiInstances};
use crate::preload::{self, PreloadReport};
use crate::service::Service;
use crate::source::{DeclarationSource, MemorySource};

type LoaderMap = FxHashMap<(ContractId, ScopeId), Arc<Loader>>;

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// Installs the process-wide registry. Fails with the argument if one is installed already.
pub fn install(registry: Registry) -> Result<&'static Registry, Registry> {
	GLOBAL.set(registry)?;
	tracing::debug!("installed process-wide registry");
	Ok(GLOBAL.get().unwrap_or_else(|| unreachable!("registry was just installed")))
}

/// Returns the process-wide registry, if installed.
pub fn global() -> Option<&'static Registry> {
	GLOBAL.get()
}

/// Builder for [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
	source: Option<Arc<dyn DeclarationSource>>,
	catalog: Option<Arc<Catalog>>,
	config: SpiConfig,
}

impl RegistryBuilder {
	pub fn source(mut self, source: impl DeclarationSource + 'static) -> Self {
		self.source = Some(Arc::new(source));
		self
	}

	pub fn catalog(mut self, catalog: impl Into<Arc<Catalog>>) -> Self {
		self.catalog = Some(catalog.into());
		self
	}

	pub fn config(mut self, config: SpiConfig) -> Self {
		self.config = config;
		self
	}

	/// Builds the registry. Defaults to an empty in-memory source and the inventory catalog.
	pub fn build(self) -> Registry {
		let env = Environment {
			source: self.source.unwrap_or_else(|| Arc::new(MemorySource::new())),
			catalog: self.catalog.unwrap_or_else(|| Arc::new(Catalog::from_inventory())),
			config: self.config,
		};
		Registry {
			env: Arc::new(env),
			loaders: ArcSwap::from_pointee(LoaderMap::default()),
			write: Mutex::new(()),
		}
	}
}

/// Cache of loaders keyed by `(contract, scope)`.
pub struct Registry {
	env: Arc<Environment>,
	loaders: ArcSwap<LoaderMap>,
	write: Mutex<()>,
}

impl Registry {
	pub fn builder() -> RegistryBuilder {
		RegistryBuilder::default()
	}

	pub fn catalog(&self) -> &Catalog {
		&self.env.catalog
	}

	pub fn source(&self) -> &dyn DeclarationSource {
		self.env.source.as_ref()
	}

	pub fn config(&self) -> &SpiConfig {
		&self.env.config
	}

	/// Returns the cached loader for `(contract, scope)`, creating it on first use.
	pub fn loader(&self, contract: impl Into<ContractId>, scope: impl Into<ScopeId>) -> Result<Arc<Loader>, SpiError> {
		let key = (contract.into(), scope.into());
		if let Some(loader) = self.loaders.load().get(&key) {
			return Ok(Arc::clone(loader));
		}

		let descriptor = self
			.env
			.catalog
			.contract(&key.0)
			.ok_or_else(|| SpiError::UnknownContract { contract: key.0.clone() })?;

		let _guard = self.write.lock();
		let current = self.loaders.load_full();
		if let Some(loader) = current.get(&key) {
			return Ok(Arc::clone(loader));
		}

		let loader = Arc::new(Loader::new(Arc::clone(&self.env), descriptor, key.1.clone()));
		tracing::debug!(contract = %key.0, scope = %key.1, "created loader");

		let mut next = LoaderMap::clone(&current);
		next.insert(key, Arc::clone(&loader));
		self.loaders.store(Arc::new(next));
		Ok(loader)
	}

	/// Number of cached loaders.
	pub fn len(&self) -> usize {
		self.loaders.load().len()
	}

	pub fn is_empty(&self) -> bool {
		self.loaders.load().is_empty()
	}

	/// Contracts with a cached loader in `scope`.
	pub(crate) fn cached_contracts(&self, scope: &ScopeId) -> Vec<ContractId> {
		self.loaders
			.load()
			.keys()
			.filter(|(_, s)| s == scope)
			.map(|(contract, _)| contract.clone())
			.collect()
	}

	pub fn resolve_single(&self, contract: impl Into<ContractId>, scope: impl Into<ScopeId>) -> Result<Arc<dyn Service>, SpiError> {
		self.loader(contract, scope)?.get_single()
	}

	pub fn resolve_optional_single(&self, contract: impl Into<ContractId>, scope: impl Into<ScopeId>) -> Result<Option<Arc<dyn Service>>, SpiError> {
		self.loader(contract, scope)?.get_optional_single()
	}

	pub fn resolve_multiple(&self, contract: impl Into<ContractId>, scope: impl Into<ScopeId>) -> Result<Arc<MultiInstances>, SpiError> {
		self.loader(contract, scope)?.get_multiple()
	}

	/// Drops every loader of `scope`. Returns how many were removed.
	pub fn invalidate(&self, scope: impl Into<ScopeId>) -> usize {
		let scope = scope.into();
		let removed = {
			let _guard = self.write.lock();
			let current = self.loaders.load_full();
			let mut removed = Vec::new();
			let mut kept = LoaderMap::default();
			for (key, loader) in current.iter() {
				if key.1 == scope {
					removed.push(Arc::clone(loader));
				} else {
					kept.insert(key.clone(), Arc::clone(loader));
				}
			}
			if removed.is_empty() {
				return 0;
			}
			self.loaders.store(Arc::new(kept));
			removed
		};

		tracing::debug!(scope = %scope, loaders = removed.len(), "invalidated scope");
		self.retire(removed)
	}

	/// Drops every loader. Returns how many were removed.
	pub fn invalidate_all(&self) -> usize {
		let previous = {
			let _guard = self.write.lock();
			self.loaders.swap(Arc::new(LoaderMap::default()))
		};

		let removed: Vec<Arc<Loader>> = previous.values().cloned().collect();
		tracing::debug!(loaders = removed.len(), "invalidated all scopes");
		self.retire(removed)
	}

	fn retire(&self, removed: Vec<Arc<Loader>>) -> usize {
		if self.env.config.teardown_on_invalidate {
			for loader in &removed {
				loader.teardown();
			}
		}
		removed.len()
	}

	/// Eagerly resolves and instantiates every contract of `scope`.
	pub fn preload(&self, scope: impl Into<ScopeId>) -> PreloadReport {
		preload::preload(self, &scope.into())
	}

	/// Computes the configuration checksum of `scope` from a fresh, uncached pass.
	pub fn checksum(&self, scope: impl Into<ScopeId>) -> Result<u64, SpiError> {
		preload::checksum(&self.env, &scope.into())
	}

	/// Computes [`Registry::checksum`] for every scope the source knows.
	pub fn checksum_all(&self) -> Result<BTreeMap<ScopeId, u64>, SpiError> {
		let scopes = self.env.source.scopes().map_err(|source| SpiError::Source {
			scope: ScopeId::from("*"),
			source,
		})?;
		scopes
			.into_iter()
			.map(|scope| preload::checksum(&self.env, &scope).map(|sum| (scope, sum)))
			.collect()
	}

	pub(crate) fn environment(&self) -> &Environment {
		&self.env
	}
}
