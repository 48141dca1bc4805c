//! Service definition resolution and interface compatibility.
//!
//! A process declares *contracts* (abstract capabilities) and links in implementations of them.
//! Declaration documents, possibly from many independent origins, say which implementation
//! serves a contract in a given *scope*. The engine parses those documents, resolves conflicts
//! between them, instantiates the winners and wraps implementations written against an older
//! contract so they satisfy the current one.
//!
//! # Modules
//!
//! - [`source`] - Declaration transport boundary and the in-memory source
//! - [`parse`] - TOML declaration documents into [`def::Definition`] values
//! - [`resolve`] - Single-winner and merge-by-name resolution
//! - [`properties`] - Per-implementation configuration bundles
//! - [`compat`] - Compatibility proxies for operations added after release
//! - [`catalog`] - Contract descriptors, factories and approaches
//! - [`loader`] - Memoized pipeline per `(contract, scope)`
//! - [`registry`] - Loader cache, invalidation, process-wide instance
//! - [`preload`] - Eager verification and configuration checksum
//!
//! # Pipeline
//!
//! ```text
//! DeclarationSource -> parse -> resolve -> factory + properties -> compat::build -> Loader -> caller
//! ```

pub mod catalog;
pub mod compat;
pub mod config;
pub mod contract;
pub mod def;
pub mod error;
pub mod ids;
pub mod loader;
pub mod parse;
pub mod preload;
pub mod properties;
pub mod registry;
pub mod resolve;
pub mod service;
pub mod source;
mod sync;
#[cfg(test)]
mod test_support;

pub use catalog::{Catalog, Construction, Factory};
pub use compat::{ApproachLookup, CompatProxy, CompatibleApproach};
pub use config::{ConfigError, OriginOrder, SpiConfig};
pub use contract::{Cardinality, ContractDescriptor, OperationDescriptor, Signature, SignatureError};
pub use def::{Definition, DefinitionSet, MultipleDefinition, PropertiesDefinition, SingleDefinition};
pub use error::{BoxError, SourceError, SpiError};
pub use ids::{ApproachId, ContractId, ImplId, OriginId, ScopeId};
#[doc(hidden)]
pub use inventory;
pub use loader::{Loader, MultiInstances};
pub use preload::PreloadReport;
pub use properties::Properties;
pub use registry::{Registry, RegistryBuilder};
pub use resolve::{MultiRegistry, Override, SingleResolution};
pub use service::{InvokeError, Lifecycle, Service, Value};
pub use source::{DeclarationSource, MemorySource, RawDeclaration};
