//! Directory-tree declaration source.
//!
//! # Layout
//!
//! ```text
//! <root>/<scope>/**/<contract>.toml
//! ```
//!
//! Every `*.toml` file under a scope directory, at any depth, declares the contract named by
//! its file stem. The origin of a document is its path relative to the scope directory, with
//! `/` separators, so origins are identical across platforms.
//!
//! # Invariants
//!
//! - Documents are listed in a deterministic order (walk sorted by file name).
//!   - Enforced in: `DirSource::walk`
//!   - Tested by: `tests::origins_are_relative_and_sorted`
//! - A scope names exactly one directory below the root.
//!   - Enforced in: `DirSource::scope_dir`
//!   - Tested by: `tests::scope_cannot_escape_root`

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use spi_engine::{ContractId, DeclarationSource, RawDeclaration, ScopeId, SourceError};
use walkdir::WalkDir;

const EXTENSION: &str = "toml";

/// One declaration file found under a scope directory.
struct Entry {
	path: PathBuf,
	origin: String,
	contract: String,
}

/// Reads declarations from a directory tree.
#[derive(Debug, Clone)]
pub struct DirSource {
	root: PathBuf,
}

impl DirSource {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn scope_dir(&self, scope: &ScopeId) -> Result<PathBuf, SourceError> {
		let rel = Path::new(scope.as_str());
		let mut components = rel.components();
		match (components.next(), components.next()) {
			(Some(Component::Normal(_)), None) => Ok(self.root.join(rel)),
			_ => Err(SourceError::InvalidPath { path: rel.to_path_buf() }),
		}
	}

	/// Lists declaration files of `scope`. A missing scope directory has none.
	fn walk(&self, scope: &ScopeId) -> Result<Vec<Entry>, SourceError> {
		let dir = self.scope_dir(scope)?;
		if !dir.is_dir() {
			return Ok(Vec::new());
		}

		let mut entries = Vec::new();
		for entry in WalkDir::new(&dir).sort_by_file_name() {
			let entry = entry.map_err(|err| {
				let path = err.path().map_or_else(|| dir.clone(), Path::to_path_buf);
				SourceError::io(path, err.into())
			})?;
			let path = entry.path();
			if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != EXTENSION) {
				continue;
			}

			let invalid = || SourceError::InvalidPath { path: path.to_path_buf() };
			let contract = path.file_stem().and_then(|s| s.to_str()).ok_or_else(invalid)?.to_string();
			let rel = path.strip_prefix(&dir).map_err(|_| invalid())?;
			let origin = rel
				.components()
				.map(|c| c.as_os_str().to_str().ok_or_else(invalid))
				.collect::<Result<Vec<_>, _>>()?
				.join("/");

			entries.push(Entry {
				path: path.to_path_buf(),
				origin,
				contract,
			});
		}
		Ok(entries)
	}
}

impl DeclarationSource for DirSource {
	fn list(&self, contract: &ContractId, scope: &ScopeId) -> Result<Vec<RawDeclaration>, SourceError> {
		let mut decls = Vec::new();
		for entry in self.walk(scope)? {
			if entry.contract != contract.as_str() {
				continue;
			}
			let text = std::fs::read_to_string(&entry.path).map_err(|err| SourceError::io(&entry.path, err))?;
			decls.push(RawDeclaration::new(entry.origin, text));
		}

		tracing::debug!(
			root = %self.root.display(),
			scope = %scope,
			contract = %contract,
			documents = decls.len(),
			"listed declaration files"
		);
		Ok(decls)
	}

	fn contracts(&self, scope: &ScopeId) -> Result<Vec<ContractId>, SourceError> {
		let contracts: BTreeSet<String> = self.walk(scope)?.into_iter().map(|e| e.contract).collect();
		Ok(contracts.into_iter().map(ContractId::from).collect())
	}

	fn scopes(&self) -> Result<Vec<ScopeId>, SourceError> {
		let read = match std::fs::read_dir(&self.root) {
			Ok(read) => read,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(err) => return Err(SourceError::io(&self.root, err)),
		};

		let mut scopes = BTreeSet::new();
		for entry in read {
			let entry = entry.map_err(|err| SourceError::io(&self.root, err))?;
			let file_type = entry.file_type().map_err(|err| SourceError::io(entry.path(), err))?;
			if !file_type.is_dir() {
				continue;
			}
			let name = entry.file_name().into_string().map_err(|_| SourceError::InvalidPath { path: entry.path() })?;
			scopes.insert(name);
		}
		Ok(scopes.into_iter().map(ScopeId::from).collect())
	}
}

#[cfg(test)]
mod tests {
	use std::fs;

	use pretty_assertions::assert_eq;

	use super::*;

	fn write(root: &Path, rel: &str, text: &str) {
		let path = root.join(rel);
		fs::create_dir_all(path.parent().unwrap()).unwrap();
		fs::write(path, text).unwrap();
	}

	#[test]
	fn origins_are_relative_and_sorted() {
		let root = tempfile::tempdir().unwrap();
		write(root.path(), "app/zz/acme.Codec.toml", "z");
		write(root.path(), "app/acme.Codec.toml", "top");
		write(root.path(), "app/aa/nested/acme.Codec.toml", "a");
		write(root.path(), "app/acme.Codec.txt", "ignored");

		let source = DirSource::new(root.path());
		let docs = source.list(&"acme.Codec".into(), &"app".into()).unwrap();
		let origins: Vec<&str> = docs.iter().map(|d| d.origin.as_str()).collect();
		assert_eq!(origins, ["aa/nested/acme.Codec.toml", "acme.Codec.toml", "zz/acme.Codec.toml"]);
		assert_eq!(&*docs[1].text, "top");
	}

	#[test]
	fn contracts_and_scopes_follow_the_tree() {
		let root = tempfile::tempdir().unwrap();
		write(root.path(), "blue/acme.Codec.toml", "");
		write(root.path(), "blue/filters/acme.Filter.toml", "");
		write(root.path(), "green/acme.Codec.toml", "");
		write(root.path(), "stray.toml", "");

		let source = DirSource::new(root.path());
		assert_eq!(
			source.contracts(&"blue".into()).unwrap(),
			[ContractId::from("acme.Codec"), ContractId::from("acme.Filter")]
		);
		assert_eq!(source.scopes().unwrap(), [ScopeId::from("blue"), ScopeId::from("green")]);
	}

	#[test]
	fn missing_directories_are_empty() {
		let root = tempfile::tempdir().unwrap();
		let source = DirSource::new(root.path().join("absent"));
		assert!(source.scopes().unwrap().is_empty());
		assert!(source.list(&"acme.Codec".into(), &"app".into()).unwrap().is_empty());
	}

	#[test]
	fn scope_cannot_escape_root() {
		let source = DirSource::new("/srv/spi");
		for scope in ["..", "a/b", "/etc", ""] {
			assert!(
				matches!(source.contracts(&scope.into()), Err(SourceError::InvalidPath { .. })),
				"{scope:?}"
			);
		}
	}
}
