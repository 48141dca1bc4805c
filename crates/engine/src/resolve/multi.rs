//! Merge-by-name resolution for multi-entry contracts.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::def::MultipleDefinition;
use crate::ids::{ContractId, ScopeId};

/// A record shadowed by a later record with the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
	pub name: Arc<str>,
	pub winner: MultipleDefinition,
	pub shadowed: MultipleDefinition,
}

/// Resolved, ordered, name-keyed registry of a multi-entry contract.
///
/// Immutable once built; shared across threads behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct MultiRegistry {
	entries: Arc<[MultipleDefinition]>,
	by_name: FxHashMap<Arc<str>, usize>,
	disabled: Arc<[MultipleDefinition]>,
	overrides: Arc<[Override]>,
}

impl MultiRegistry {
	/// Looks up the enabled winner for `name`.
	#[inline]
	pub fn get(&self, name: &str) -> Option<&MultipleDefinition> {
		self.by_name.get(name).map(|&idx| &self.entries[idx])
	}

	/// Returns the position of `name` in iteration order.
	#[inline]
	pub fn position(&self, name: &str) -> Option<usize> {
		self.by_name.get(name).copied()
	}

	/// Returns enabled winners sorted by rank.
	#[inline]
	pub fn all(&self) -> &[MultipleDefinition] {
		&self.entries
	}

	/// Returns enabled names in iteration order.
	pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
		self.entries.iter().map(|d| &*d.name)
	}

	/// Winners excluded because they are disabled, in first-encounter order.
	pub fn disabled(&self) -> &[MultipleDefinition] {
		&self.disabled
	}

	/// Records discarded because a later record reused their name.
	pub fn overrides(&self) -> &[Override] {
		&self.overrides
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

/// Merges raw records by name.
///
/// `defs` must already be in origin load order. Within a name group the last record wins
/// outright; the survivors are stable-sorted by rank, so equal ranks keep the order in which
/// their names were first encountered.
pub fn resolve_multiple(contract: &ContractId, scope: &ScopeId, defs: &[MultipleDefinition]) -> MultiRegistry {
	let mut slots: Vec<MultipleDefinition> = Vec::new();
	let mut slot_of: FxHashMap<Arc<str>, usize> = FxHashMap::default();
	let mut overrides = Vec::new();

	for def in defs {
		match slot_of.get(&def.name) {
			Some(&slot) => {
				let shadowed = std::mem::replace(&mut slots[slot], def.clone());
				overrides.push(Override {
					name: def.name.clone(),
					winner: def.clone(),
					shadowed,
				});
			}
			None => {
				slot_of.insert(def.name.clone(), slots.len());
				slots.push(def.clone());
			}
		}
	}

	// An override record names the immediate successor; rewrite to the final winner.
	for record in &mut overrides {
		record.winner = slots[slot_of[&record.name]].clone();
	}

	let (disabled, mut entries): (Vec<_>, Vec<_>) = slots.into_iter().partition(|d| d.disabled);
	entries.sort_by_key(|d| d.rank);

	let by_name = entries.iter().enumerate().map(|(idx, d)| (d.name.clone(), idx)).collect();

	tracing::debug!(
		contract = %contract,
		scope = %scope,
		entries = entries.len(),
		disabled = disabled.len(),
		overrides = overrides.len(),
		"resolved multiple definitions"
	);

	MultiRegistry {
		entries: Arc::from(entries),
		by_name,
		disabled: Arc::from(disabled),
		overrides: Arc::from(overrides),
	}
}
