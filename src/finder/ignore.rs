use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

/// `.gitignore`-style pruning for the file walk
pub struct IgnoreFilter {
    inner: Gitignore,
}

impl IgnoreFilter {
    pub fn new(root: &Path) -> Self {
        let mut builder = GitignoreBuilder::new(root);

        builder.add(root.join(".gitignore"));
        builder.add(root.join(".ignore"));

        // VCS metadata and our own index directory are never sources
        for pattern in [".git/", ".declindex/"] {
            builder.add_line(None, pattern).ok();
        }

        Self {
            inner: builder.build().unwrap_or_else(|_| Gitignore::empty()),
        }
    }

    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        self.inner.matched(path, is_dir).is_ignore()
    }
}
