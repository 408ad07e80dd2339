//! Declaration extractors
//!
//! The index engine only knows the [`Extractor`] contract; language support
//! is plugged in through an [`ExtractorRegistry`]. PHP is built in, using the
//! tree-sitter PHP grammar.

pub mod framework;
pub mod php;
pub mod types;

pub use framework::{default_registry, Extractor, ExtractorRegistry};
pub use php::PhpExtractor;
