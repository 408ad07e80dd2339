//! Index update cycle
//!
//! One call to [`IndexUpdater::update`] loads the index, resets it on a
//! format-version mismatch, applies the change set produced by the
//! projector (re-extracting new and changed files), re-links trait
//! composition, stamps the version and saves. Any error aborts the cycle
//! before the save, leaving the index on disk untouched.

use std::fmt;
use std::path::Path;

use tracing::{debug, info};

use crate::adapter::ExtractorRegistry;
use crate::changeset::{ChangeEvent, ChangeSetProjector};
use crate::finder::FileEntry;
use crate::index::Index;
use crate::linker::{LinkStats, TraitLinker};
use crate::Result;

/// Format version written by this build; indexes stamped otherwise are rebuilt
pub const INDEX_FORMAT_VERSION: &str = "1";

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct UpdateStats {
    pub new: usize,
    pub changed: usize,
    pub removed: usize,
    /// mtime moved, content identical: not re-extracted
    pub touched: usize,
    pub unchanged: usize,
    /// The index was cleared because of a version mismatch
    pub reset: bool,
    pub link: LinkStats,
}

impl UpdateStats {
    /// Files whose declarations were (re)extracted
    pub fn extracted(&self) -> usize {
        self.new + self.changed
    }
}

impl fmt::Display for UpdateStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Index Update Stats:")?;
        if self.reset {
            writeln!(f, "  ♻️  Rebuilt after version change")?;
        }
        writeln!(f, "  ➕ New: {}", self.new)?;
        writeln!(f, "  ✏️  Changed: {}", self.changed)?;
        writeln!(f, "  ➖ Removed: {}", self.removed)?;
        writeln!(f, "  👆 Touched: {}", self.touched)?;
        writeln!(f, "  ✅ Unchanged: {}", self.unchanged)?;
        write!(f, "{}", self.link)
    }
}

pub struct IndexUpdater {
    version: String,
    registry: ExtractorRegistry,
    projector: ChangeSetProjector,
}

impl IndexUpdater {
    pub fn new(version: impl Into<String>, registry: ExtractorRegistry) -> Self {
        Self {
            version: version.into(),
            registry,
            projector: ChangeSetProjector::new(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Run a full cycle against the index stored at `index_path`
    pub fn update<I>(&self, index_path: &Path, files: I) -> Result<UpdateStats>
    where
        I: IntoIterator<Item = FileEntry>,
    {
        let mut index = Index::open(index_path)?;
        let stats = self.update_index(&mut index, files)?;
        index.save(index_path)?;
        Ok(stats)
    }

    /// Apply one cycle to an in-memory index, without saving
    pub fn update_index<I>(&self, index: &mut Index, files: I) -> Result<UpdateStats>
    where
        I: IntoIterator<Item = FileEntry>,
    {
        let mut stats = UpdateStats::default();
        index.compact();

        if index.version() != Some(self.version.as_str()) {
            info!(
                "Index version mismatch ({} != {}); reindexing all files",
                index.version().unwrap_or("(none)"),
                self.version
            );
            index.reset();
            stats.reset = true;
        }

        let changes = self.projector.project(&index.file_table(), files);
        stats.unchanged = changes.unchanged();

        for change in changes {
            match change? {
                ChangeEvent::Removed { relative_path } => {
                    info!("File removed from index: {}", relative_path);
                    index.remove_file(&relative_path)?;
                    stats.removed += 1;
                }
                ChangeEvent::New {
                    relative_path,
                    absolute_path,
                    mtime,
                    hash,
                } => {
                    info!("New file discovered: {}", relative_path);
                    self.reindex_file(index, &relative_path, &absolute_path, mtime, &hash)?;
                    stats.new += 1;
                }
                ChangeEvent::Changed {
                    relative_path,
                    absolute_path,
                    mtime,
                    hash,
                } => {
                    info!("Indexed file changed: {}", relative_path);
                    self.reindex_file(index, &relative_path, &absolute_path, mtime, &hash)?;
                    stats.changed += 1;
                }
                ChangeEvent::Touched { relative_path, mtime } => {
                    debug!("Recording new mtime for unchanged content: {}", relative_path);
                    index.touch_file(&relative_path, mtime)?;
                    stats.touched += 1;
                }
            }
        }

        stats.link = TraitLinker::new(index.document_mut()).run()?;
        index.set_version(&self.version);

        Ok(stats)
    }

    fn reindex_file(
        &self,
        index: &mut Index,
        relative_path: &str,
        absolute_path: &Path,
        mtime: i64,
        hash: &str,
    ) -> Result<()> {
        let node = index.upsert_file(relative_path, mtime, hash)?;
        let doc = index.document_mut();
        doc.clear_children(node);

        if !self.registry.extract(absolute_path, doc, node)? {
            debug!("No extractor for {}, recording file only", relative_path);
        }
        Ok(())
    }
}
