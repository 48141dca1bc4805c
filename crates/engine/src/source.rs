//! Declaration transport boundary.
//!
//! A [`DeclarationSource`] locates raw declaration documents. The engine never assumes where
//! they live; it only requires that a given environment returns them in a deterministic order.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::SourceError;
use crate::ids::{ContractId, OriginId, ScopeId};

/// One raw declaration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDeclaration {
	pub origin: OriginId,
	pub text: Arc<str>,
}

impl RawDeclaration {
	pub fn new(origin: impl Into<OriginId>, text: impl Into<Arc<str>>) -> Self {
		Self {
			origin: origin.into(),
			text: text.into(),
		}
	}
}

/// Supplies raw declarations per `(contract, scope)`.
pub trait DeclarationSource: Send + Sync {
	/// Lists every declaration of `contract` visible in `scope`.
	fn list(&self, contract: &ContractId, scope: &ScopeId) -> Result<Vec<RawDeclaration>, SourceError>;

	/// Lists the contracts that have at least one declaration in `scope`.
	fn contracts(&self, scope: &ScopeId) -> Result<Vec<ContractId>, SourceError>;

	/// Lists every scope this source knows.
	fn scopes(&self) -> Result<Vec<ScopeId>, SourceError>;
}

impl<S: DeclarationSource + ?Sized> DeclarationSource for Arc<S> {
	fn list(&self, contract: &ContractId, scope: &ScopeId) -> Result<Vec<RawDeclaration>, SourceError> {
		(**self).list(contract, scope)
	}

	fn contracts(&self, scope: &ScopeId) -> Result<Vec<ContractId>, SourceError> {
		(**self).contracts(scope)
	}

	fn scopes(&self) -> Result<Vec<ScopeId>, SourceError> {
		(**self).scopes()
	}
}

type MemoryTable = BTreeMap<ScopeId, BTreeMap<ContractId, Vec<RawDeclaration>>>;

/// Mutable in-memory source, for embedded declarations and tests.
///
/// Declarations are returned in insertion order.
#[derive(Default)]
pub struct MemorySource {
	table: RwLock<MemoryTable>,
}

impl MemorySource {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds (or replaces, by origin) a declaration document.
	pub fn insert(&self, scope: impl Into<ScopeId>, contract: impl Into<ContractId>, decl: RawDeclaration) {
		let mut table = self.table.write();
		let docs = table.entry(scope.into()).or_default().entry(contract.into()).or_default();
		match docs.iter_mut().find(|d| d.origin == decl.origin) {
			Some(existing) => *existing = decl,
			None => docs.push(decl),
		}
	}

	/// Builder-style variant of [`MemorySource::insert`].
	pub fn with(self, scope: &str, contract: &str, origin: &str, text: &str) -> Self {
		self.insert(scope, contract, RawDeclaration::new(origin, text));
		self
	}

	/// Removes a declaration document. Returns true if it existed.
	pub fn remove(&self, scope: &str, contract: &str, origin: &str) -> bool {
		let mut table = self.table.write();
		let Some(docs) = table.get_mut(scope).and_then(|c| c.get_mut(contract)) else {
			return false;
		};
		let before = docs.len();
		docs.retain(|d| d.origin.as_str() != origin);
		before != docs.len()
	}
}

impl DeclarationSource for MemorySource {
	fn list(&self, contract: &ContractId, scope: &ScopeId) -> Result<Vec<RawDeclaration>, SourceError> {
		let table = self.table.read();
		Ok(table.get(scope).and_then(|c| c.get(contract)).cloned().unwrap_or_default())
	}

	fn contracts(&self, scope: &ScopeId) -> Result<Vec<ContractId>, SourceError> {
		let table = self.table.read();
		Ok(table
			.get(scope)
			.map(|c| c.iter().filter(|(_, docs)| !docs.is_empty()).map(|(id, _)| id.clone()).collect())
			.unwrap_or_default())
	}

	fn scopes(&self) -> Result<Vec<ScopeId>, SourceError> {
		let table = self.table.read();
		let scopes: BTreeSet<ScopeId> = table.keys().cloned().collect();
		Ok(scopes.into_iter().collect())
	}
}
