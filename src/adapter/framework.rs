//! Core extractor framework
//!
//! Defines the contract every declaration extractor implements and the
//! registry the updater dispatches files through.

use crate::store::{Document, NodeId};
use crate::Result;
use std::path::Path;

/// Trait for declaration extractors
///
/// An extractor reads one source file and appends its declarations
/// (`class`, `trait`, `function`, ...) under the given, already-cleared
/// `file` node. Unparseable input is reported as [`crate::Error::Extraction`].
pub trait Extractor: Send + Sync {
    /// Get the extractor name (for display)
    fn name(&self) -> &str;

    /// Get file extensions this extractor handles
    fn extensions(&self) -> &[&str];

    /// Check if this extractor can handle a file
    fn can_handle(&self, path: &Path) -> bool {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            self.extensions().contains(&ext)
        } else {
            false
        }
    }

    /// Populate `file_node` with the declarations found in `path`
    fn extract(&self, path: &Path, doc: &mut Document, file_node: NodeId) -> Result<()>;
}

/// Registry of declaration extractors
#[derive(Default)]
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extractor
    pub fn register(&mut self, extractor: impl Extractor + 'static) {
        self.extractors.push(Box::new(extractor));
    }

    /// Find an extractor for a file
    pub fn find(&self, path: &Path) -> Option<&dyn Extractor> {
        self.extractors
            .iter()
            .find(|e| e.can_handle(path))
            .map(|e| e.as_ref())
    }

    pub fn extractors(&self) -> &[Box<dyn Extractor>] {
        &self.extractors
    }

    /// Extract `path` into `file_node`; `Ok(false)` when no extractor handles it
    pub fn extract(&self, path: &Path, doc: &mut Document, file_node: NodeId) -> Result<bool> {
        match self.find(path) {
            Some(extractor) => {
                extractor.extract(path, doc, file_node)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Create a default registry with all built-in extractors
pub fn default_registry() -> ExtractorRegistry {
    let mut registry = ExtractorRegistry::new();
    registry.register(super::php::PhpExtractor::new());
    registry
}
