//! The `files` table view over a [`Document`]
//!
//! The persisted index has a single `files` root carrying the format
//! `version`; every indexed source file is a `file` child keyed by its
//! normalized relative `path`, with `mtime` and `hash` attributes and the
//! file's declarations nested beneath it.

use std::collections::BTreeMap;
use std::path::Path;

use crate::store::{literal, Document, Matches, NodeId};
use crate::Result;

/// Label of the index root node
pub const ROOT_LABEL: &str = "files";

/// Recorded state of one indexed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFile {
    pub mtime: i64,
    pub hash: String,
}

/// A declaration index backed by a [`Document`]
#[derive(Debug)]
pub struct Index {
    doc: Document,
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}

impl Index {
    /// An index with no files and no version
    pub fn new() -> Self {
        Self {
            doc: Document::new(ROOT_LABEL),
        }
    }

    /// Load the index stored at `path`; a missing file yields an empty index
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            doc: Document::load(path, ROOT_LABEL)?,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.doc.save(path)
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Format version stamped on the root, if any
    pub fn version(&self) -> Option<&str> {
        self.doc
            .attribute(self.doc.root(), "version")
            .filter(|v| !v.is_empty())
    }

    pub fn set_version(&mut self, version: &str) {
        let root = self.doc.root();
        self.doc.set_attribute(root, "version", version);
    }

    /// Drop every indexed file, keeping the root and its attributes
    pub fn reset(&mut self) {
        let root = self.doc.root();
        self.doc.clear_children(root);
    }

    /// Rebuild the arena once detached nodes outnumber attached ones.
    ///
    /// Node ids obtained before a compaction must not be used afterwards.
    pub fn compact(&mut self) -> bool {
        if self.doc.slot_count() <= 2 * self.doc.len() {
            return false;
        }
        self.doc = self.doc.compacted();
        true
    }

    // ========== File table ==========

    /// Recorded `(mtime, hash)` for every indexed path
    pub fn file_table(&self) -> BTreeMap<String, IndexedFile> {
        let mut table = BTreeMap::new();
        let root = self.doc.root();

        for &file in self.doc.children(root) {
            if self.doc.label(file) != "file" {
                continue;
            }
            let Some(path) = self.doc.attribute(file, "path") else {
                continue;
            };
            table.entry(path.to_string()).or_insert_with(|| IndexedFile {
                mtime: self
                    .doc
                    .attribute(file, "mtime")
                    .and_then(|m| m.parse().ok())
                    .unwrap_or_default(),
                hash: self.doc.attribute(file, "hash").unwrap_or_default().to_string(),
            });
        }

        table
    }

    pub fn file_node(&self, relative_path: &str) -> Result<Option<NodeId>> {
        self.doc.try_first_node(&file_expr(relative_path))
    }

    /// Record `mtime` and `hash` for a file, creating its node when absent
    pub fn upsert_file(&mut self, relative_path: &str, mtime: i64, hash: &str) -> Result<NodeId> {
        let path = normalize_key(relative_path);
        let node = match self.file_node(&path)? {
            Some(node) => node,
            None => {
                let root = self.doc.root();
                self.doc.add_child(root, "file", [("path", path.as_str())])
            }
        };

        self.doc.set_attribute(node, "mtime", mtime.to_string());
        self.doc.set_attribute(node, "hash", hash);
        Ok(node)
    }

    /// Update only the recorded mtime; returns false if the path is not indexed
    pub fn touch_file(&mut self, relative_path: &str, mtime: i64) -> Result<bool> {
        match self.file_node(relative_path)? {
            Some(node) => {
                self.doc.set_attribute(node, "mtime", mtime.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove every file node recorded under `relative_path`
    pub fn remove_file(&mut self, relative_path: &str) -> Result<usize> {
        let nodes: Vec<NodeId> = self.doc.query(&file_expr(relative_path))?.nodes().collect();
        for node in &nodes {
            self.doc.remove_node(*node);
        }
        Ok(nodes.len())
    }

    pub fn file_count(&self) -> usize {
        self.file_table().len()
    }

    // ========== Queries ==========

    pub fn query(&self, expr: &str) -> Result<Matches> {
        self.doc.query(expr)
    }

    pub fn query_first(&self, expr: &str, default: Option<&str>) -> Result<String> {
        self.doc.query_first(expr, default)
    }

    pub fn first_string(&self, expr: &str) -> Result<String> {
        self.doc.first_string(expr)
    }

    pub fn strings(&self, expr: &str) -> Result<Vec<String>> {
        self.doc.strings(expr)
    }

    pub fn exists(&self, expr: &str) -> Result<bool> {
        self.doc.exists(expr)
    }
}

/// Forward slashes, no leading `./`
pub fn normalize_key(relative_path: &str) -> String {
    let path = relative_path.replace('\\', "/");
    let mut trimmed = path.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.to_string()
}

fn file_expr(relative_path: &str) -> String {
    format!("/files/file[@path={}]", literal(&normalize_key(relative_path)))
}
