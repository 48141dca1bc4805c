//! Contract descriptors and operation signatures.
//!
//! # Role
//!
//! A contract is described once, by its author, as a list of operation signatures. Operations
//! introduced after the first release carry an [`Added`] marker naming the compatible approach
//! that stands in for implementations built before the addition.
//!
//! # Invariants
//!
//! - Signatures within one contract are unique (enforced by [`ContractBuilder::build`]).
//! - A [`Signature`] is canonical: whitespace is stripped, so `f(A, B)` and `f(A,B)` are equal.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::ids::{ApproachId, ContractId, ScopeId};

/// Errors produced while parsing a signature or building a contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
	#[error("signature {0:?} is missing a parameter list")]
	MissingParens(String),
	#[error("signature {0:?} has an invalid operation name")]
	InvalidName(String),
	#[error("signature {0:?} has an empty parameter type")]
	EmptyParameter(String),
	#[error("contract {contract} declares {signature} twice")]
	Duplicate { contract: ContractId, signature: Signature },
}

/// Canonical operation descriptor: `name(Type,Type,...)`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signature {
	text: Arc<str>,
	name_len: usize,
	arity: usize,
}

impl Signature {
	/// Parses a signature such as `newMethod(String, String)`.
	pub fn parse(input: &str) -> Result<Self, SignatureError> {
		let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
		let (Some(open), true) = (compact.find('('), compact.ends_with(')')) else {
			return Err(SignatureError::MissingParens(input.to_string()));
		};

		let name = &compact[..open];
		let valid_name = name.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
			&& name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.');
		if !valid_name {
			return Err(SignatureError::InvalidName(input.to_string()));
		}

		let params = &compact[open + 1..compact.len() - 1];
		if params.contains('(') || params.contains(')') {
			return Err(SignatureError::MissingParens(input.to_string()));
		}
		let arity = if params.is_empty() {
			0
		} else {
			if params.split(',').any(str::is_empty) {
				return Err(SignatureError::EmptyParameter(input.to_string()));
			}
			params.split(',').count()
		};

		Ok(Self {
			name_len: name.len(),
			text: Arc::from(compact),
			arity,
		})
	}

	/// Returns the operation name without its parameter list.
	pub fn name(&self) -> &str {
		&self.text[..self.name_len]
	}

	/// Returns the parameter types in declaration order.
	pub fn params(&self) -> impl Iterator<Item = &str> + '_ {
		let inner = &self.text[self.name_len + 1..self.text.len() - 1];
		inner.split(',').filter(|p| !p.is_empty())
	}

	/// Returns the number of parameters.
	pub fn arity(&self) -> usize {
		self.arity
	}

	/// Returns the canonical text form.
	pub fn as_str(&self) -> &str {
		&self.text
	}
}

impl fmt::Display for Signature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.text)
	}
}

impl fmt::Debug for Signature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Signature({})", self.text)
	}
}

/// Marker for an operation introduced after the contract's first release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Added {
	/// Fallback handler for implementations that predate the operation.
	pub approach: Option<ApproachId>,
}

/// One operation of a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
	pub signature: Signature,
	pub added: Option<Added>,
}

impl OperationDescriptor {
	/// Returns true for operations added after the first release.
	pub fn is_added(&self) -> bool {
		self.added.is_some()
	}

	/// Returns the declared compatible approach, if any.
	pub fn approach(&self) -> Option<&ApproachId> {
		self.added.as_ref().and_then(|a| a.approach.as_ref())
	}
}

/// Whether a contract resolves to one winner or to a named, ordered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
	Single,
	Multiple,
}

impl fmt::Display for Cardinality {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Single => write!(f, "single"),
			Self::Multiple => write!(f, "multiple"),
		}
	}
}

/// Full description of a contract: identity, cardinality and operation set.
#[derive(Debug, Clone)]
pub struct ContractDescriptor {
	id: ContractId,
	cardinality: Cardinality,
	optional: bool,
	required_in: Arc<[ScopeId]>,
	operations: Arc<[OperationDescriptor]>,
	by_signature: FxHashMap<Signature, usize>,
}

impl ContractDescriptor {
	/// Starts building a descriptor.
	pub fn builder(id: impl Into<ContractId>, cardinality: Cardinality) -> ContractBuilder {
		ContractBuilder {
			id: id.into(),
			cardinality,
			optional: false,
			required_in: Vec::new(),
			operations: Vec::new(),
		}
	}

	pub fn id(&self) -> &ContractId {
		&self.id
	}

	pub fn cardinality(&self) -> Cardinality {
		self.cardinality
	}

	/// Optional contracts may resolve to nothing without failing preload.
	pub fn is_optional(&self) -> bool {
		self.optional
	}

	/// Whether the contract is pinned to `scope`, so preload checks it even when the scope
	/// declares nothing for it.
	pub fn is_required_in(&self, scope: &ScopeId) -> bool {
		self.required_in.contains(scope)
	}

	/// Returns all operations in declaration order.
	pub fn operations(&self) -> &[OperationDescriptor] {
		&self.operations
	}

	/// Looks up an operation by signature.
	pub fn operation(&self, signature: &Signature) -> Option<&OperationDescriptor> {
		self.by_signature.get(signature).map(|&idx| &self.operations[idx])
	}

	/// Returns true if `signature` is part of this contract.
	pub fn has_operation(&self, signature: &Signature) -> bool {
		self.by_signature.contains_key(signature)
	}
}

/// Builder for [`ContractDescriptor`].
pub struct ContractBuilder {
	id: ContractId,
	cardinality: Cardinality,
	optional: bool,
	required_in: Vec<ScopeId>,
	operations: Vec<Result<OperationDescriptor, SignatureError>>,
}

impl ContractBuilder {
	/// Marks the contract as optional.
	pub fn optional(mut self, on: bool) -> Self {
		self.optional = on;
		self
	}

	/// Pins the contract to `scope`.
	pub fn required_in(mut self, scope: impl Into<ScopeId>) -> Self {
		self.required_in.push(scope.into());
		self
	}

	/// Adds an operation present since the first release.
	pub fn operation(mut self, signature: &str) -> Self {
		self.operations.push(Signature::parse(signature).map(|signature| OperationDescriptor { signature, added: None }));
		self
	}

	/// Adds an operation introduced later, with its fallback approach.
	pub fn added_operation(mut self, signature: &str, approach: Option<&str>) -> Self {
		let added = Added {
			approach: approach.map(ApproachId::from),
		};
		self.operations.push(Signature::parse(signature).map(|signature| OperationDescriptor {
			signature,
			added: Some(added),
		}));
		self
	}

	/// Validates signatures and builds the descriptor.
	pub fn build(self) -> Result<ContractDescriptor, SignatureError> {
		let mut operations = Vec::with_capacity(self.operations.len());
		let mut by_signature = FxHashMap::with_capacity_and_hasher(self.operations.len(), Default::default());
		for op in self.operations {
			let op = op?;
			if by_signature.insert(op.signature.clone(), operations.len()).is_some() {
				return Err(SignatureError::Duplicate {
					contract: self.id,
					signature: op.signature,
				});
			}
			operations.push(op);
		}

		Ok(ContractDescriptor {
			id: self.id,
			cardinality: self.cardinality,
			optional: self.optional,
			required_in: Arc::from(self.required_in),
			operations: Arc::from(operations),
			by_signature,
		})
	}
}
