//! Conflict resolution over raw definitions.
//!
//! # Precedence Contract
//!
//! - **Single mode:** lowest `priority` wins. Any tie at the lowest priority is fatal
//!   ([`crate::SpiError::AmbiguousSingleDefinition`]).
//!   - Enforced in: [`single::resolve_single`]
//!   - Tested by: `single::tests::test_winner_independent_of_input_order`
//! - **Multi mode:** group by `name`; the last record in origin load order wins the whole
//!   record; disabled winners leave the list; survivors sort by `rank`, ties in first-encounter
//!   order.
//!   - Enforced in: [`multi::resolve_multiple`]
//!   - Tested by: `multi::tests::test_rank_ties_keep_first_encounter_order`
//!
//! Both resolvers are pure: they take a snapshot and return a new immutable value.

pub mod multi;
pub mod single;

pub use multi::{MultiRegistry, Override, resolve_multiple};
pub use single::{SingleResolution, resolve_single};
