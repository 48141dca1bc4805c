//! Declaration document parser.
//!
//! # Role
//!
//! Turns one raw TOML declaration document into typed [`Definition`] values. The parser checks
//! shape only: required fields, integer `priority`/`rank`, non-empty `name` and
//! `implementation`, scalar property values. It never looks across records, so duplicate names
//! and implementations pass through untouched.
//!
//! # Output order
//!
//! All `[[single]]` records, then `[[multiple]]`, then `[[properties]]`, each in document order.

use indexmap::IndexMap;
use serde::Deserialize;

use crate::def::{Definition, DefinitionHeader, DefinitionSet, MultipleDefinition, PropertiesDefinition, SingleDefinition};
use crate::error::SpiError;
use crate::ids::{ContractId, ImplId, ScopeId};
use crate::source::RawDeclaration;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Document {
	#[serde(default)]
	single: Vec<SingleRecord>,
	#[serde(default)]
	multiple: Vec<MultipleRecord>,
	#[serde(default)]
	properties: Vec<PropertiesRecord>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SingleRecord {
	implementation: String,
	priority: i64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MultipleRecord {
	name: String,
	implementation: String,
	#[serde(default)]
	rank: i64,
	#[serde(default)]
	disabled: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PropertiesRecord {
	implementation: String,
	#[serde(default)]
	priority: i64,
	#[serde(default)]
	values: toml::Table,
}

/// Parses one declaration document.
pub fn parse(contract: &ContractId, scope: &ScopeId, decl: &RawDeclaration) -> Result<Vec<Definition>, SpiError> {
	let malformed = |message: String| SpiError::MalformedDeclaration {
		contract: contract.clone(),
		scope: scope.clone(),
		origin: decl.origin.clone(),
		message: message.into(),
	};

	let doc: Document = toml::from_str(&decl.text).map_err(|e| malformed(e.to_string().trim_end().to_string()))?;
	let header = |implementation: String, what: &str, index: usize| {
		if implementation.trim().is_empty() {
			return Err(malformed(format!("{what}[{index}]: implementation must not be empty")));
		}
		Ok(DefinitionHeader {
			contract: contract.clone(),
			implementation: ImplId::from(implementation),
			origin: decl.origin.clone(),
		})
	};

	let mut defs = Vec::with_capacity(doc.single.len() + doc.multiple.len() + doc.properties.len());

	for (index, rec) in doc.single.into_iter().enumerate() {
		defs.push(Definition::Single(SingleDefinition {
			header: header(rec.implementation, "single", index)?,
			priority: rec.priority,
		}));
	}

	for (index, rec) in doc.multiple.into_iter().enumerate() {
		if rec.name.trim().is_empty() {
			return Err(malformed(format!("multiple[{index}]: name must not be empty")));
		}
		defs.push(Definition::Multiple(MultipleDefinition {
			header: header(rec.implementation, "multiple", index)?,
			name: rec.name.into(),
			rank: rec.rank,
			disabled: rec.disabled,
		}));
	}

	for (index, rec) in doc.properties.into_iter().enumerate() {
		let mut properties = IndexMap::with_capacity(rec.values.len());
		for (key, value) in rec.values {
			let text = scalar_text(value).ok_or_else(|| malformed(format!("properties[{index}].values.{key}: value must be a scalar")))?;
			properties.insert(key, text);
		}
		defs.push(Definition::Properties(PropertiesDefinition {
			header: header(rec.implementation, "properties", index)?,
			priority: rec.priority,
			properties,
		}));
	}

	Ok(defs)
}

/// Parses every document of a contract, in the order given.
///
/// Every document is parsed even after a failure so that all malformed documents are reported
/// together.
pub fn parse_all(contract: &ContractId, scope: &ScopeId, decls: &[RawDeclaration]) -> Result<DefinitionSet, SpiError> {
	let mut set = DefinitionSet::default();
	let mut errors = Vec::new();
	for decl in decls {
		match parse(contract, scope, decl) {
			Ok(defs) => set.extend(defs),
			Err(e) => errors.push(e),
		}
	}
	match SpiError::from_many(errors) {
		Some(err) => Err(err),
		None => Ok(set),
	}
}

fn scalar_text(value: toml::Value) -> Option<String> {
	match value {
		toml::Value::String(s) => Some(s),
		toml::Value::Integer(i) => Some(i.to_string()),
		toml::Value::Float(f) => Some(f.to_string()),
		toml::Value::Boolean(b) => Some(b.to_string()),
		toml::Value::Datetime(d) => Some(d.to_string()),
		toml::Value::Array(_) | toml::Value::Table(_) => None,
	}
}
