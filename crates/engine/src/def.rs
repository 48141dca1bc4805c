//! Parsed definition records.
//!
//! Definitions are immutable values produced fresh on every discovery pass. Nothing in this
//! module deduplicates: several origins may legally describe the same implementation or the
//! same name, and only the resolvers decide between them.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::ids::{ContractId, ImplId, OriginId};

/// Identity fields shared by every definition shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DefinitionHeader {
	pub contract: ContractId,
	pub implementation: ImplId,
	pub origin: OriginId,
}

/// Candidate for single-winner resolution. Lower `priority` wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleDefinition {
	pub header: DefinitionHeader,
	pub priority: i64,
}

/// Named entry for multi-mode resolution. Lower `rank` iterates first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipleDefinition {
	pub header: DefinitionHeader,
	pub name: Arc<str>,
	pub rank: i64,
	pub disabled: bool,
}

/// Named configuration bundle attached to one implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertiesDefinition {
	pub header: DefinitionHeader,
	pub priority: i64,
	pub properties: IndexMap<String, String>,
}

/// One raw definition, in any of its shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definition {
	Single(SingleDefinition),
	Multiple(MultipleDefinition),
	Properties(PropertiesDefinition),
}

impl Definition {
	pub fn header(&self) -> &DefinitionHeader {
		match self {
			Self::Single(d) => &d.header,
			Self::Multiple(d) => &d.header,
			Self::Properties(d) => &d.header,
		}
	}

	pub fn implementation(&self) -> &ImplId {
		&self.header().implementation
	}

	pub fn origin(&self) -> &OriginId {
		&self.header().origin
	}
}

macro_rules! impl_header_access {
	($($ty:ty),*) => {$(
		impl $ty {
			pub fn implementation(&self) -> &ImplId {
				&self.header.implementation
			}

			pub fn origin(&self) -> &OriginId {
				&self.header.origin
			}
		}
	)*};
}

impl_header_access!(SingleDefinition, MultipleDefinition, PropertiesDefinition);

/// All raw definitions of one contract in one scope, split by shape, in origin load order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionSet {
	pub singles: Vec<SingleDefinition>,
	pub multiples: Vec<MultipleDefinition>,
	pub properties: Vec<PropertiesDefinition>,
}

impl DefinitionSet {
	/// Appends definitions, keeping their order within each shape.
	pub fn extend<I: IntoIterator<Item = Definition>>(&mut self, defs: I) {
		for def in defs {
			match def {
				Definition::Single(d) => self.singles.push(d),
				Definition::Multiple(d) => self.multiples.push(d),
				Definition::Properties(d) => self.properties.push(d),
			}
		}
	}

	/// Total number of raw definitions.
	pub fn len(&self) -> usize {
		self.singles.len() + self.multiples.len() + self.properties.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
