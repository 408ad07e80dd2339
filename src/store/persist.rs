//! JSON persistence for [`Document`]
//!
//! Every node is stored as `{"label", "attributes", "children"}`; empty
//! attribute maps and child lists are omitted. Attribute maps are sorted, so
//! saving the same tree twice yields identical bytes.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::node::{Document, NodeId};
use crate::{Error, Result};

#[derive(Debug, Serialize, Deserialize)]
struct StoredNode {
    label: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<StoredNode>,
}

impl Document {
    /// Load a document from `path`.
    ///
    /// A missing or empty file yields a document with an empty `root_label`
    /// root. Malformed content, or a root with another label, is
    /// [`Error::CorruptStore`].
    pub fn load(path: &Path, root_label: &str) -> Result<Document> {
        let content = match fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Document::new(root_label));
            }
            Err(e) => return Err(Error::io(path, e)),
        };

        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(Document::new(root_label));
        }

        let stored: StoredNode = serde_json::from_slice(&content).map_err(|e| Error::CorruptStore {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if stored.label != root_label {
            return Err(Error::CorruptStore {
                path: path.to_path_buf(),
                reason: format!("expected root `{}`, found `{}`", root_label, stored.label),
            });
        }

        let mut doc = Document::new(root_label);
        let root = doc.root();
        for (key, value) in stored.attributes {
            doc.set_attribute(root, key, value);
        }

        let mut pending: Vec<(StoredNode, NodeId)> =
            stored.children.into_iter().rev().map(|child| (child, root)).collect();
        while let Some((node, parent)) = pending.pop() {
            let id = doc.add_child(parent, node.label, node.attributes);
            pending.extend(node.children.into_iter().rev().map(|child| (child, id)));
        }

        Ok(doc)
    }

    /// Serialize the attached tree to `path`, replacing it atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        let stored = self.to_stored(self.root());
        let json = serde_json::to_vec_pretty(&stored).map_err(|e| Error::io(path, e.into()))?;
        atomic_write(path, &json).map_err(|e| Error::io(path, e))
    }

    fn to_stored(&self, node: NodeId) -> StoredNode {
        StoredNode {
            label: self.label(node).to_string(),
            attributes: self.attributes(node).clone(),
            children: self.children(node).iter().map(|child| self.to_stored(*child)).collect(),
        }
    }
}

/// Write to a sibling temp file, sync it, then rename over `path`
fn atomic_write(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("tmp");
    let written = write_synced(&tmp_path, contents).and_then(|()| fs::rename(&tmp_path, path));
    if written.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    written
}

fn write_synced(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;

    {
        let mut writer = BufWriter::new(&mut file);
        writer.write_all(contents)?;
        writer.flush()?;
    }
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Document {
        let mut doc = Document::new("files");
        let root = doc.root();
        doc.set_attribute(root, "version", "1");
        let file = doc.add_child(root, "file", [("path", "a.php"), ("mtime", "10"), ("hash", "ab")]);
        let class = doc.add_child(file, "class", [("name", "C")]);
        doc.add_child(class, "method", [("name", "m")]);
        doc.add_child(class, "property", [("name", "p"), ("fromTrait", "T")]);
        doc
    }

    #[test]
    fn test_missing_and_empty_files_load_empty_root() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let doc = Document::load(&missing, "files").unwrap();
        assert_eq!(doc.label(doc.root()), "files");
        assert!(doc.is_empty());

        let empty = dir.path().join("empty.json");
        fs::write(&empty, "").unwrap();
        assert!(Document::load(&empty, "files").unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load_preserves_structure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/index.json");
        sample().save(&path).unwrap();

        let doc = Document::load(&path, "files").unwrap();
        assert_eq!(doc.first_string("/files/@version").unwrap(), "1");
        assert_eq!(doc.strings("//class/*/@name").unwrap(), vec!["m", "p"]);
        assert_eq!(doc.first_string("//property/@fromTrait").unwrap(), "T");
    }

    #[test]
    fn test_saves_are_byte_identical() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first.json");
        let second = dir.path().join("second.json");

        sample().save(&first).unwrap();
        Document::load(&first, "files").unwrap().save(&second).unwrap();

        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
        assert!(!dir.path().join("first.tmp").exists());
    }

    #[test]
    fn test_detached_nodes_are_not_saved() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");
        let mut doc = sample();
        let file = doc.first_node("/files/file").unwrap();
        doc.remove_node(file);
        doc.save(&path).unwrap();

        let loaded = Document::load(&path, "files").unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_corrupt_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Document::load(&path, "files"), Err(Error::CorruptStore { .. })));

        fs::write(&path, r#"{"label": "other"}"#).unwrap();
        assert!(matches!(Document::load(&path, "files"), Err(Error::CorruptStore { .. })));
    }

    #[test]
    fn test_undecodable_bytes_are_corrupt_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");

        fs::write(&path, [0xff, 0xfe, 0x00, 0x7b]).unwrap();
        assert!(matches!(Document::load(&path, "files"), Err(Error::CorruptStore { .. })));

        fs::write(&path, " \n\t").unwrap();
        assert!(Document::load(&path, "files").unwrap().is_empty());
    }

    #[test]
    fn test_save_into_unwritable_location_is_io_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let path = blocker.join("index.json");

        match sample().save(&path) {
            Err(Error::Io { path: failed, .. }) => assert_eq!(failed, path),
            other => panic!("expected Io error, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_rename_removes_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");
        fs::create_dir_all(path.join("occupied")).unwrap();

        assert!(matches!(sample().save(&path), Err(Error::Io { .. })));
        assert!(!dir.path().join("index.tmp").exists());
        assert!(path.join("occupied").is_dir());
    }
}
