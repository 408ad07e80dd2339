//! Change-set projection: diff the recorded file table against the files
//! currently on disk.
//!
//! Paths missing from disk are `Removed`, unseen paths are `New`, and paths
//! whose mtime moved are fingerprinted: a different content hash makes them
//! `Changed`, an identical one only `Touched`.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::finder::FileEntry;
use crate::index::{normalize_key, IndexedFile};
use crate::{Error, Result};

/// One classified difference between the index and the filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Removed {
        relative_path: String,
    },
    New {
        relative_path: String,
        absolute_path: PathBuf,
        mtime: i64,
        hash: String,
    },
    Changed {
        relative_path: String,
        absolute_path: PathBuf,
        mtime: i64,
        hash: String,
    },
    /// mtime moved but the content fingerprint did not
    Touched { relative_path: String, mtime: i64 },
}

impl ChangeEvent {
    pub fn relative_path(&self) -> &str {
        match self {
            ChangeEvent::Removed { relative_path }
            | ChangeEvent::New { relative_path, .. }
            | ChangeEvent::Changed { relative_path, .. }
            | ChangeEvent::Touched { relative_path, .. } => relative_path,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::Removed { .. } => "removed",
            ChangeEvent::New { .. } => "new",
            ChangeEvent::Changed { .. } => "changed",
            ChangeEvent::Touched { .. } => "touched",
        }
    }
}

/// Content fingerprint of a file: BLAKE3 hex digest
pub fn fingerprint(path: &Path) -> Result<String> {
    let content = fs::read(path).map_err(|e| Error::io(path, e))?;
    Ok(blake3::hash(&content).to_string())
}

#[derive(Debug)]
enum Pending {
    Removed(String),
    New(FileEntry),
    Candidate(FileEntry, String),
}

/// Lazy sequence of change events.
///
/// Removed events come first (sorted by path), then New, then Changed or
/// Touched, both in enumeration order. Files are fingerprinted only when their
/// event is pulled; a read failure is yielded as an [`Error::Io`].
#[derive(Debug)]
pub struct ChangeSet {
    pending: VecDeque<Pending>,
    unchanged: usize,
}

impl ChangeSet {
    /// Files whose recorded mtime still matches
    pub fn unchanged(&self) -> usize {
        self.unchanged
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Iterator for ChangeSet {
    type Item = Result<ChangeEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        let event = match self.pending.pop_front()? {
            Pending::Removed(relative_path) => Ok(ChangeEvent::Removed { relative_path }),
            Pending::New(entry) => fingerprint(&entry.absolute_path).map(|hash| ChangeEvent::New {
                relative_path: entry.relative_path,
                absolute_path: entry.absolute_path,
                mtime: entry.mtime,
                hash,
            }),
            Pending::Candidate(entry, recorded_hash) => {
                fingerprint(&entry.absolute_path).map(|hash| {
                    if hash == recorded_hash {
                        debug!("mtime drift without content change: {}", entry.relative_path);
                        ChangeEvent::Touched {
                            relative_path: entry.relative_path,
                            mtime: entry.mtime,
                        }
                    } else {
                        ChangeEvent::Changed {
                            relative_path: entry.relative_path,
                            absolute_path: entry.absolute_path,
                            mtime: entry.mtime,
                            hash,
                        }
                    }
                })
            }
        };
        Some(event)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.pending.len(), Some(self.pending.len()))
    }
}

/// Classifies enumerated files against a recorded file table
#[derive(Debug, Default)]
pub struct ChangeSetProjector;

impl ChangeSetProjector {
    pub fn new() -> Self {
        Self
    }

    pub fn project<I>(&self, recorded: &BTreeMap<String, IndexedFile>, files: I) -> ChangeSet
    where
        I: IntoIterator<Item = FileEntry>,
    {
        let mut seen = HashSet::new();
        let mut new_files = Vec::new();
        let mut candidates = Vec::new();
        let mut unchanged = 0;

        for mut entry in files {
            entry.relative_path = normalize_key(&entry.relative_path);
            if !seen.insert(entry.relative_path.clone()) {
                continue;
            }

            match recorded.get(&entry.relative_path) {
                None => new_files.push(Pending::New(entry)),
                Some(known) if known.mtime != entry.mtime => {
                    let hash = known.hash.clone();
                    candidates.push(Pending::Candidate(entry, hash));
                }
                Some(_) => unchanged += 1,
            }
        }

        // BTreeMap iteration is already sorted by path
        let mut pending: VecDeque<Pending> = recorded
            .keys()
            .filter(|path| !seen.contains(*path))
            .map(|path| Pending::Removed(path.clone()))
            .collect();
        pending.extend(new_files);
        pending.extend(candidates);

        ChangeSet { pending, unchanged }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(dir: &Path, relative: &str, mtime: i64) -> FileEntry {
        FileEntry {
            relative_path: relative.to_string(),
            absolute_path: dir.join(relative),
            mtime,
        }
    }

    fn recorded(items: &[(&str, i64, &str)]) -> BTreeMap<String, IndexedFile> {
        items
            .iter()
            .map(|(path, mtime, hash)| {
                (
                    path.to_string(),
                    IndexedFile {
                        mtime: *mtime,
                        hash: hash.to_string(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_classification_and_order() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("new.php"), "<?php").unwrap();
        fs::write(dir.path().join("same.php"), "<?php").unwrap();
        fs::write(dir.path().join("edited.php"), "<?php // v2").unwrap();

        let table = recorded(&[
            ("zz_gone.php", 1, "x"),
            ("a_gone.php", 1, "x"),
            ("same.php", 5, "irrelevant"),
            ("edited.php", 1, "old"),
        ]);
        let files = vec![
            entry(dir.path(), "edited.php", 2),
            entry(dir.path(), "new.php", 1),
            entry(dir.path(), "same.php", 5),
        ];

        let changes = ChangeSetProjector::new().project(&table, files);
        assert_eq!(changes.unchanged(), 1);

        let events: Vec<_> = changes.collect::<Result<_>>().unwrap();
        let summary: Vec<_> = events.iter().map(|e| (e.kind(), e.relative_path())).collect();
        assert_eq!(
            summary,
            vec![
                ("removed", "a_gone.php"),
                ("removed", "zz_gone.php"),
                ("new", "new.php"),
                ("changed", "edited.php"),
            ]
        );
    }

    #[test]
    fn test_mtime_drift_with_same_content_is_touched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.php");
        fs::write(&path, "<?php class A {}").unwrap();
        let hash = fingerprint(&path).unwrap();

        let table = recorded(&[("a.php", 1, hash.as_str())]);
        let events: Vec<_> = ChangeSetProjector::new()
            .project(&table, vec![entry(dir.path(), "a.php", 9)])
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(
            events,
            vec![ChangeEvent::Touched {
                relative_path: "a.php".to_string(),
                mtime: 9
            }]
        );
    }

    #[test]
    fn test_duplicate_enumeration_first_wins() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.php"), "x").unwrap();

        let files = vec![entry(dir.path(), "a.php", 1), entry(dir.path(), "./a.php", 2)];
        let events: Vec<_> = ChangeSetProjector::new()
            .project(&BTreeMap::new(), files)
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ChangeEvent::New { mtime: 1, .. }));
    }

    #[test]
    fn test_unreadable_file_surfaces_io_error() {
        let dir = tempdir().unwrap();
        let mut changes = ChangeSetProjector::new().project(&BTreeMap::new(), vec![entry(dir.path(), "ghost.php", 1)]);

        match changes.next() {
            Some(Err(Error::Io { path, .. })) => assert!(path.ends_with("ghost.php")),
            other => panic!("expected io error, got {:?}", other),
        }
        assert!(changes.next().is_none());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.php");
        fs::write(&path, "one").unwrap();
        let first = fingerprint(&path).unwrap();
        fs::write(&path, "two").unwrap();
        assert_ne!(first, fingerprint(&path).unwrap());
        assert_eq!(first, blake3::hash(b"one").to_string());
    }
}
