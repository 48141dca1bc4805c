//! String identifiers shared across the engine.
//!
//! Every identifier is an `Arc<str>` newtype so definitions, registries and errors can
//! carry them around without reallocating.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

macro_rules! string_id {
	($(#[$attr:meta])* $name:ident) => {
		$(#[$attr])*
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
		pub struct $name(Arc<str>);

		impl $name {
			/// Creates an identifier from any string-like value.
			pub fn new(id: impl Into<Arc<str>>) -> Self {
				Self(id.into())
			}

			/// Returns the identifier text.
			#[inline]
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(&self.0)
			}
		}

		impl fmt::Debug for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}({:?})", stringify!($name), &*self.0)
			}
		}

		impl From<&str> for $name {
			fn from(id: &str) -> Self {
				Self(Arc::from(id))
			}
		}

		impl From<String> for $name {
			fn from(id: String) -> Self {
				Self(Arc::from(id))
			}
		}

		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}

		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
	};
}

string_id!(
	/// Identifier of a contract (the abstract capability).
	ContractId
);
string_id!(
	/// Identifier of a concrete implementation type.
	ImplId
);
string_id!(
	/// Named isolation boundary under which declarations are discovered and cached.
	ScopeId
);
string_id!(
	/// Identifier of the declaration document a definition was read from.
	OriginId
);
string_id!(
	/// Identifier of a compatible approach (fallback handler strategy).
	ApproachId
);

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;

	#[test]
	fn ids_borrow_as_str_for_map_lookup() {
		let mut map = HashMap::new();
		map.insert(ContractId::from("acme.Codec"), 1);
		assert_eq!(map.get("acme.Codec"), Some(&1));
	}

	#[test]
	fn ids_order_lexically() {
		let mut origins = vec![OriginId::from("b.toml"), OriginId::from("a.toml"), OriginId::from("B.toml")];
		origins.sort();
		let texts: Vec<_> = origins.iter().map(OriginId::as_str).collect();
		assert_eq!(texts, ["B.toml", "a.toml", "b.toml"]);
	}
}
