//! Per-implementation configuration bundles.
//!
//! Every [`PropertiesDefinition`] targeting an implementation is merged into one ordered map
//! handed to its factory. Typed binding of the values is left to the implementation.
//!
//! # Precedence
//!
//! Bundles apply from the largest `priority` to the smallest, ties in origin load order, each
//! overwriting earlier keys. The lowest priority value therefore wins, and within a tie the
//! last origin wins.

use std::str::FromStr;

use indexmap::IndexMap;

use crate::def::PropertiesDefinition;
use crate::ids::ImplId;

/// Merged configuration for one implementation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
	values: IndexMap<String, String>,
}

impl Properties {
	/// Merges every bundle in `defs` that targets `implementation`.
	pub fn merge_for(implementation: &ImplId, defs: &[PropertiesDefinition]) -> Self {
		let mut bundles: Vec<&PropertiesDefinition> = defs.iter().filter(|d| d.implementation() == implementation).collect();
		bundles.sort_by_key(|d| std::cmp::Reverse(d.priority));

		let mut values = IndexMap::new();
		for bundle in bundles {
			for (key, value) in &bundle.properties {
				values.insert(key.clone(), value.clone());
			}
		}
		Self { values }
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.values.get(key).map(String::as_str)
	}

	/// Parses a value with [`FromStr`]. `None` if the key is absent.
	pub fn parse<T: FromStr>(&self, key: &str) -> Option<Result<T, T::Err>> {
		self.get(key).map(str::parse)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
		self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self {
			values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::def::DefinitionHeader;

	fn bundle(implementation: &str, priority: i64, origin: &str, pairs: &[(&str, &str)]) -> PropertiesDefinition {
		PropertiesDefinition {
			header: DefinitionHeader {
				contract: "acme.Codec".into(),
				implementation: implementation.into(),
				origin: origin.into(),
			},
			priority,
			properties: pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
		}
	}

	#[test]
	fn lowest_priority_value_wins_per_key() {
		let defs = [
			bundle("acme.Fast", 0, "a", &[("level", "9"), ("mode", "strict")]),
			bundle("acme.Fast", 10, "b", &[("level", "1"), ("buffer", "4096")]),
		];
		let props = Properties::merge_for(&"acme.Fast".into(), &defs);
		assert_eq!(props.get("level"), Some("9"));
		assert_eq!(props.get("buffer"), Some("4096"));
		assert_eq!(props.get("mode"), Some("strict"));
		assert_eq!(props.len(), 3);
	}

	#[test]
	fn equal_priority_last_origin_wins() {
		let defs = [
			bundle("acme.Fast", 5, "a", &[("level", "1")]),
			bundle("acme.Fast", 5, "b", &[("level", "2")]),
		];
		let props = Properties::merge_for(&"acme.Fast".into(), &defs);
		assert_eq!(props.get("level"), Some("2"));
	}

	#[test]
	fn other_implementations_are_ignored() {
		let defs = [bundle("acme.Other", 0, "a", &[("level", "1")])];
		assert!(Properties::merge_for(&"acme.Fast".into(), &defs).is_empty());
	}

	#[test]
	fn parse_reports_absent_and_invalid_values() {
		let props: Properties = [("retries", "3"), ("ratio", "x")].into_iter().collect();
		assert_eq!(props.parse::<u32>("retries"), Some(Ok(3)));
		assert!(matches!(props.parse::<f64>("ratio"), Some(Err(_))));
		assert!(props.parse::<u32>("missing").is_none());
	}
}
