//! File enumeration
//!
//! Walks a working directory and yields every file whose relative path
//! matches at least one include glob (all files when there are none) and no
//! exclude glob.

pub mod glob;
pub mod ignore;
pub mod paths;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use ::ignore::WalkBuilder;

use self::glob::GlobMatcher;
use self::ignore::IgnoreFilter;
use crate::{Error, Result};

/// One enumerated file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Forward-slash path relative to the working directory, no leading `./`
    pub relative_path: String,
    pub absolute_path: PathBuf,
    /// Modification time in seconds since the Unix epoch
    pub mtime: i64,
}

pub struct Finder {
    working_dir: String,
    includes: Vec<GlobMatcher>,
    excludes: Vec<GlobMatcher>,
    respect_gitignore: bool,
}

impl Finder {
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            working_dir: paths::normalize_path(&working_dir.as_ref().to_string_lossy()),
            includes: Vec::new(),
            excludes: Vec::new(),
            respect_gitignore: false,
        }
    }

    pub fn working_dir(&self) -> &Path {
        Path::new(&self.working_dir)
    }

    pub fn add_include(&mut self, pattern: &str) -> Result<()> {
        self.includes.push(GlobMatcher::new(pattern)?);
        Ok(())
    }

    pub fn add_exclude(&mut self, pattern: &str) -> Result<()> {
        self.excludes.push(GlobMatcher::new(pattern)?);
        Ok(())
    }

    /// Also prune paths ignored by `.gitignore`/`.ignore` files in the working directory
    pub fn respect_gitignore(&mut self, enabled: bool) {
        self.respect_gitignore = enabled;
    }

    fn is_selected(&self, relative_path: &str) -> bool {
        let included = self.includes.is_empty() || self.includes.iter().any(|g| g.is_match(relative_path));
        included && !self.excludes.iter().any(|g| g.is_match(relative_path))
    }

    /// Enumerate matching files, sorted by path within each directory
    pub fn find(&self) -> Result<Vec<FileEntry>> {
        let root = PathBuf::from(&self.working_dir);
        let mut builder = WalkBuilder::new(&root);
        builder
            .standard_filters(false)
            .sort_by_file_name(|a, b| a.cmp(b));

        if self.respect_gitignore {
            let filter = Arc::new(IgnoreFilter::new(&root));
            builder.filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                entry.depth() == 0 || !filter.is_ignored(entry.path(), is_dir)
            });
        }

        let mut files = Vec::new();
        for entry in builder.build() {
            let entry = entry?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
            let relative_path = relative.to_string_lossy().replace('\\', "/");
            if !self.is_selected(&relative_path) {
                continue;
            }

            let metadata = entry.metadata()?;
            let mtime = metadata
                .modified()
                .map_err(|e| Error::io(entry.path(), e))?
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or_default();

            files.push(FileEntry {
                absolute_path: PathBuf::from(paths::concat_paths(&self.working_dir, &relative_path)),
                relative_path,
                mtime,
            });
        }

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "<?php").unwrap();
    }

    fn relative_paths(finder: &Finder) -> Vec<String> {
        finder.find().unwrap().into_iter().map(|f| f.relative_path).collect()
    }

    #[test]
    fn test_include_and_exclude() {
        let dir = tempdir().unwrap();
        for name in [
            "tests/Suspects/ClassAttributeA.php",
            "tests/Suspects/ClassAttributeB.php",
            "tests/Suspects/MethodAttributeA.php",
            "tests/Suspects/MethodAttributeB.php",
            "tests/Suspects/FunctionAttributeA.php",
            "tests/Suspects/MyClass.php",
            "src/Index.php",
        ] {
            touch(dir.path(), name);
        }

        let mut finder = Finder::new(dir.path());
        finder.add_include("tests/**/*Attribute*.php").unwrap();
        finder.add_exclude("tests/**/Class*.php").unwrap();

        assert_eq!(
            relative_paths(&finder),
            vec![
                "tests/Suspects/FunctionAttributeA.php",
                "tests/Suspects/MethodAttributeA.php",
                "tests/Suspects/MethodAttributeB.php",
            ]
        );
    }

    #[test]
    fn test_no_includes_selects_everything() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "b.php");
        touch(dir.path(), "a/c.txt");

        let files = Finder::new(dir.path()).find().unwrap();
        let names: Vec<_> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(names, vec!["a/c.txt", "b.php"]);

        assert!(files[1].absolute_path.ends_with("b.php"));
        assert!(files[1].absolute_path.exists());
        assert!(files[1].mtime > 0);
    }

    #[test]
    fn test_gitignore_is_opt_in() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "src/A.php");
        touch(dir.path(), "cache/B.php");
        touch(dir.path(), ".declindex/index.json");
        fs::write(dir.path().join(".gitignore"), "cache/\n").unwrap();

        let mut finder = Finder::new(dir.path());
        finder.add_include("**.php").unwrap();
        assert_eq!(relative_paths(&finder), vec!["cache/B.php", "src/A.php"]);

        finder.respect_gitignore(true);
        assert_eq!(relative_paths(&finder), vec!["src/A.php"]);
    }

    #[test]
    fn test_invalid_glob_is_rejected() {
        let mut finder = Finder::new(".");
        assert!(finder.add_include("{unclosed").is_err());
    }
}
