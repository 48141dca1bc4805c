//! Single-winner resolution.

use crate::def::SingleDefinition;
use crate::error::SpiError;
use crate::ids::{ContractId, ScopeId};

/// Outcome of single-mode resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleResolution {
	/// Winning definition.
	pub winner: SingleDefinition,
	/// Every candidate in precedence order; `candidates[0]` is the winner.
	pub candidates: Vec<SingleDefinition>,
}

/// Picks the definition with the lowest priority.
///
/// Any tie at the lowest priority is ambiguous, even between two declarations of the same
/// implementation. The sort is stable, so the error names the tied records in origin order.
pub fn resolve_single(contract: &ContractId, scope: &ScopeId, defs: &[SingleDefinition]) -> Result<SingleResolution, SpiError> {
	let mut candidates = defs.to_vec();
	candidates.sort_by_key(|d| d.priority);

	let Some(winner) = candidates.first().cloned() else {
		return Err(SpiError::NoDefinitionFound {
			contract: contract.clone(),
			scope: scope.clone(),
		});
	};

	if let Some(rival) = candidates.get(1).filter(|d| d.priority == winner.priority) {
		return Err(SpiError::AmbiguousSingleDefinition {
			contract: contract.clone(),
			scope: scope.clone(),
			first: winner.implementation().clone(),
			second: rival.implementation().clone(),
			priority: winner.priority,
		});
	}

	tracing::debug!(
		contract = %contract,
		scope = %scope,
		winner = %winner.implementation(),
		priority = winner.priority,
		candidates = candidates.len(),
		"resolved single definition"
	);

	Ok(SingleResolution { winner, candidates })
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;

	use super::*;
	use crate::def::DefinitionHeader;

	fn def(implementation: &str, priority: i64, origin: &str) -> SingleDefinition {
		SingleDefinition {
			header: DefinitionHeader {
				contract: "acme.Codec".into(),
				implementation: implementation.into(),
				origin: origin.into(),
			},
			priority,
		}
	}

	fn resolve(defs: &[SingleDefinition]) -> Result<SingleResolution, SpiError> {
		resolve_single(&"acme.Codec".into(), &"app".into(), defs)
	}

	#[test]
	fn test_lowest_priority_wins() {
		let res = resolve(&[def("slow", 20, "a"), def("fast", 10, "b"), def("legacy", 30, "c")]).unwrap();
		assert_eq!(res.winner.implementation().as_str(), "fast");
		let order: Vec<i64> = res.candidates.iter().map(|d| d.priority).collect();
		assert_eq!(order, [10, 20, 30]);
	}

	#[test]
	fn test_negative_priorities_are_allowed() {
		let res = resolve(&[def("a", 0, "a"), def("b", -100, "b")]).unwrap();
		assert_eq!(res.winner.implementation().as_str(), "b");
	}

	#[test]
	fn test_empty_input_is_no_definition_found() {
		assert!(matches!(resolve(&[]), Err(SpiError::NoDefinitionFound { .. })));
	}

	#[test]
	fn test_tie_at_minimum_is_ambiguous() {
		let err = resolve(&[def("a", 5, "x"), def("b", 5, "y"), def("c", 9, "z")]).unwrap_err();
		let SpiError::AmbiguousSingleDefinition { first, second, priority, .. } = err else {
			panic!("expected ambiguity, got {err}");
		};
		assert_eq!(first.as_str(), "a");
		assert_eq!(second.as_str(), "b");
		assert_eq!(priority, 5);
	}

	/// A tie above the minimum does not matter.
	#[test]
	fn test_tie_above_minimum_is_fine() {
		let res = resolve(&[def("a", 5, "x"), def("b", 5, "y"), def("c", 1, "z")]).unwrap();
		assert_eq!(res.winner.implementation().as_str(), "c");
	}

	/// Two origins declaring the same implementation at the winning priority still tie.
	#[test]
	fn test_same_implementation_tie_is_ambiguous() {
		let err = resolve(&[def("a", 5, "x"), def("a", 5, "y"), def("b", 7, "z")]).unwrap_err();
		assert!(
			matches!(&err, SpiError::AmbiguousSingleDefinition { first, second, priority: 5, .. }
				if first.as_str() == "a" && second.as_str() == "a"),
			"{err}"
		);
	}

	/// The same implementation at two priorities is not a tie.
	#[test]
	fn test_repeated_implementation_at_distinct_priorities() {
		let res = resolve(&[def("a", 5, "x"), def("a", 1, "y")]).unwrap();
		assert_eq!(res.winner.origin().as_str(), "y");
		assert_eq!(res.candidates.len(), 2);
	}

	proptest! {
		/// With distinct priorities the minimum wins regardless of input order.
		#[test]
		fn test_winner_independent_of_input_order(
			defs in proptest::collection::hash_set(-1000i64..1000, 1..12)
				.prop_map(|ps| ps.into_iter().map(|p| def(&format!("impl{p}"), p, "origin")).collect::<Vec<_>>())
				.prop_shuffle()
		) {
			let min = defs.iter().map(|d| d.priority).min().unwrap();
			let res = resolve(&defs).unwrap();
			prop_assert_eq!(res.winner.priority, min);
			let expected = format!("impl{min}");
			prop_assert_eq!(res.winner.implementation().as_str(), expected.as_str());
		}
	}
}
