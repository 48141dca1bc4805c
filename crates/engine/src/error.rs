//! Error taxonomy for discovery, resolution and instantiation.

use std::path::PathBuf;
use std::sync::Arc;

use crate::contract::{Cardinality, Signature};
use crate::ids::{ApproachId, ContractId, ImplId, OriginId, ScopeId};

/// Boxed error returned by factories and lifecycle hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shared error cause, kept in an `Arc` so [`SpiError`] stays `Clone`.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Failure reported by a [`crate::source::DeclarationSource`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
	#[error("failed to read {}: {source}", .path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: Arc<std::io::Error>,
	},
	#[error("declaration path {} is not valid UTF-8", .path.display())]
	InvalidPath { path: PathBuf },
	#[error("{message}")]
	Other { message: Arc<str> },
}

impl SourceError {
	pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Self::Io {
			path: path.into(),
			source: Arc::new(source),
		}
	}
}

/// Engine error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SpiError {
	/// A raw declaration could not be decoded into its expected shape.
	#[error("malformed declaration {origin} for {contract} in scope {scope}: {message}")]
	MalformedDeclaration {
		contract: ContractId,
		scope: ScopeId,
		origin: OriginId,
		message: Arc<str>,
	},

	/// Two single definitions share the lowest priority.
	#[error("ambiguous single definition for {contract} in scope {scope}: {first} and {second} share priority {priority}")]
	AmbiguousSingleDefinition {
		contract: ContractId,
		scope: ScopeId,
		first: ImplId,
		second: ImplId,
		priority: i64,
	},

	/// A required contract has no definition in scope.
	#[error("no definition found for {contract} in scope {scope}")]
	NoDefinitionFound { contract: ContractId, scope: ScopeId },

	/// An implementation lacks an added operation and the contract offers no usable fallback.
	#[error("{implementation} lacks {operation} of {contract} (scope {scope}) and {}", describe_approach(.approach))]
	MissingCompatibleApproach {
		contract: ContractId,
		scope: ScopeId,
		implementation: ImplId,
		operation: Signature,
		approach: Option<ApproachId>,
	},

	/// An implementation lacks an operation that has been part of the contract since release.
	#[error("{implementation} does not implement {operation} of {contract} (scope {scope})")]
	UnimplementedOperation {
		contract: ContractId,
		scope: ScopeId,
		implementation: ImplId,
		operation: Signature,
	},

	/// Constructing a concrete implementation failed.
	#[error("failed to instantiate {implementation} for {contract} in scope {scope}: {source}")]
	Instantiation {
		contract: ContractId,
		scope: ScopeId,
		implementation: ImplId,
		#[source]
		source: SharedError,
	},

	/// The loader was invalidated; resolve again through the registry.
	#[error("loader for {contract} in scope {scope} was invalidated")]
	Retired { contract: ContractId, scope: ScopeId },

	#[error("unknown contract {contract}")]
	UnknownContract { contract: ContractId },

	#[error("{contract} is declared {declared} but was used as {requested}")]
	CardinalityMismatch {
		contract: ContractId,
		declared: Cardinality,
		requested: Cardinality,
	},

	#[error("duplicate {kind} registration: {key}")]
	DuplicateRegistration { kind: &'static str, key: Arc<str> },

	#[error("declaration source failed for scope {scope}: {source}")]
	Source {
		scope: ScopeId,
		#[source]
		source: SourceError,
	},

	#[error("{} errors: {}", .errors.len(), join_errors(.errors))]
	Aggregate { errors: Vec<SpiError> },
}

fn describe_approach(approach: &Option<ApproachId>) -> String {
	match approach {
		Some(id) => format!("compatible approach {id} is not registered"),
		None => "no compatible approach is declared".to_string(),
	}
}

fn join_errors(errors: &[SpiError]) -> String {
	errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl SpiError {
	pub(crate) fn instantiation(contract: &ContractId, scope: &ScopeId, implementation: &ImplId, source: impl Into<BoxError>) -> Self {
		Self::Instantiation {
			contract: contract.clone(),
			scope: scope.clone(),
			implementation: implementation.clone(),
			source: Arc::from(source.into()),
		}
	}

	/// Returns the contract this error concerns, when there is exactly one.
	pub fn contract(&self) -> Option<&ContractId> {
		match self {
			Self::MalformedDeclaration { contract, .. }
			| Self::AmbiguousSingleDefinition { contract, .. }
			| Self::NoDefinitionFound { contract, .. }
			| Self::MissingCompatibleApproach { contract, .. }
			| Self::UnimplementedOperation { contract, .. }
			| Self::Instantiation { contract, .. }
			| Self::Retired { contract, .. }
			| Self::UnknownContract { contract }
			| Self::CardinalityMismatch { contract, .. } => Some(contract),
			Self::DuplicateRegistration { .. } | Self::Source { .. } | Self::Aggregate { .. } => None,
		}
	}

	/// Flattens nested [`SpiError::Aggregate`] values into their leaf errors.
	pub fn flatten(self) -> Vec<SpiError> {
		match self {
			Self::Aggregate { errors } => errors.into_iter().flat_map(SpiError::flatten).collect(),
			other => vec![other],
		}
	}

	/// Collapses a list of errors: one stays as-is, several become an aggregate.
	pub(crate) fn from_many(mut errors: Vec<SpiError>) -> Option<Self> {
		match errors.len() {
			0 => None,
			1 => errors.pop(),
			_ => Some(Self::Aggregate { errors }),
		}
	}
}
