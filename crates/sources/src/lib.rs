//! Declaration sources for `spi-engine`.
//!
//! - [`DirSource`] - one directory per scope, one TOML document per contract file
//! - [`LayeredSource`] - several sources stacked under origin prefixes

mod dir;
mod layered;

pub use dir::DirSource;
pub use layered::LayeredSource;
