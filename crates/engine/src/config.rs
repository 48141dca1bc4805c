//! Engine configuration.
//!
//! Written in TOML; every key is optional:
//!
//! ```toml
//! # "lexical" (default) or "as-listed"
//! origin-order = "lexical"
//! teardown-on-invalidate = true
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {}: {error}", .path.display())]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Error parsing TOML or an unknown key.
	#[error("config parse error: {0}")]
	Parse(#[from] toml::de::Error),
}

/// Order in which declarations of one contract are fed to the resolvers.
///
/// Multi-mode "last wins" is evaluated over this order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OriginOrder {
	/// Sort by origin identifier, byte-wise. Independent of the transport.
	#[default]
	Lexical,
	/// Keep the order the declaration source returned.
	AsListed,
}

/// Tunables for a [`crate::Registry`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct SpiConfig {
	pub origin_order: OriginOrder,
	/// Run `on_teardown` on instances of invalidated loaders.
	pub teardown_on_invalidate: bool,
}

impl Default for SpiConfig {
	fn default() -> Self {
		Self {
			origin_order: OriginOrder::Lexical,
			teardown_on_invalidate: true,
		}
	}
}

impl SpiConfig {
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(input)?)
	}

	/// Reads and parses a configuration file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&input)
	}
}
