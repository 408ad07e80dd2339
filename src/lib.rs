//! # Declindex - Incremental Declaration Index
//!
//! Persistent, queryable structural index of source declarations.
//!
//! Declindex provides:
//! - An arena-backed structured store with XPath-style path queries
//! - A change-set projector that diffs the index against the filesystem
//!   using modification time and a BLAKE3 content fingerprint
//! - A trait composition linker that flattens `use` edges into classes
//! - An update orchestrator that drives one synchronization cycle
//! - Pluggable declaration extractors (tree-sitter PHP built in)

pub mod store;
pub mod index;
pub mod changeset;
pub mod linker;
pub mod updater;
pub mod finder;
pub mod adapter;
pub mod config;

use std::path::PathBuf;

// Re-exports for convenient access
pub use store::{Document, Match, Matches, NodeId};
pub use index::{Index, IndexedFile};
pub use changeset::{ChangeEvent, ChangeSet, ChangeSetProjector};
pub use linker::{LinkStats, TraitLinker};
pub use updater::{IndexUpdater, UpdateStats, INDEX_FORMAT_VERSION};
pub use finder::{FileEntry, Finder};
pub use adapter::{Extractor, ExtractorRegistry};

/// Result type alias for Declindex operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Declindex operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt index store at {path}: {reason}")]
    CorruptStore { path: PathBuf, reason: String },

    #[error("No match for path expression: {0}")]
    NotFound(String),

    #[error("Invalid path expression `{expr}` at offset {offset}: {reason}")]
    InvalidQuery {
        expr: String,
        offset: usize,
        reason: String,
    },

    #[error("Extraction failed for {path}: {reason}")]
    Extraction { path: PathBuf, reason: String },

    #[error("Invalid glob pattern `{pattern}`: {reason}")]
    InvalidGlob { pattern: String, reason: String },

    #[error("Directory walk error: {0}")]
    Walk(#[from] ignore::Error),
}

impl Error {
    /// Tag an IO error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Build an extraction error for a file
    pub fn extraction(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Extraction {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
