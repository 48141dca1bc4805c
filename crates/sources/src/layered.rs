//! Stacked declaration sources.
//!
//! Each layer contributes its documents under the origin `<layer>:<origin>`. With the default
//! lexical origin order, layer names therefore decide precedence between layers: a layer named
//! `20-site` overrides `10-defaults` in multi-mode resolution.

use std::collections::BTreeSet;
use std::sync::Arc;

use spi_engine::{ContractId, DeclarationSource, OriginId, RawDeclaration, ScopeId, SourceError};

/// Concatenation of named sources, in layer order.
#[derive(Default)]
pub struct LayeredSource {
	layers: Vec<(Arc<str>, Box<dyn DeclarationSource>)>,
}

impl LayeredSource {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a layer.
	pub fn layer(mut self, name: impl Into<Arc<str>>, source: impl DeclarationSource + 'static) -> Self {
		self.layers.push((name.into(), Box::new(source)));
		self
	}

	/// Layer names in order.
	pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
		self.layers.iter().map(|(name, _)| &**name)
	}
}

impl DeclarationSource for LayeredSource {
	fn list(&self, contract: &ContractId, scope: &ScopeId) -> Result<Vec<RawDeclaration>, SourceError> {
		let mut decls = Vec::new();
		for (name, source) in &self.layers {
			decls.extend(source.list(contract, scope)?.into_iter().map(|decl| RawDeclaration {
				origin: OriginId::from(format!("{name}:{}", decl.origin)),
				text: decl.text,
			}));
		}
		Ok(decls)
	}

	fn contracts(&self, scope: &ScopeId) -> Result<Vec<ContractId>, SourceError> {
		let mut contracts = BTreeSet::new();
		for (_, source) in &self.layers {
			contracts.extend(source.contracts(scope)?);
		}
		Ok(contracts.into_iter().collect())
	}

	fn scopes(&self) -> Result<Vec<ScopeId>, SourceError> {
		let mut scopes = BTreeSet::new();
		for (_, source) in &self.layers {
			scopes.extend(source.scopes()?);
		}
		Ok(scopes.into_iter().collect())
	}
}
