use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "declindex.toml";
pub const INDEX_DIR: &str = ".declindex";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct DeclindexConfig {
    /// Index file; defaults to `<root>/.declindex/index.json`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// Directory to enumerate; defaults to the current directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub respect_gitignore: bool,
}

impl DeclindexConfig {
    pub fn root_dir(&self) -> PathBuf {
        PathBuf::from(self.root.as_deref().unwrap_or("."))
    }

    pub fn index_path(&self) -> PathBuf {
        match &self.index {
            Some(index) => PathBuf::from(index),
            None => default_index_path_in(&self.root_dir()),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from(CONFIG_FILE)
}

pub fn default_index_path_in(base: &Path) -> PathBuf {
    base.join(INDEX_DIR).join("index.json")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<DeclindexConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: DeclindexConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &DeclindexConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Append the index directory to `<project_root>/.gitignore` unless already listed
pub fn ensure_gitignore(project_root: &Path) -> anyhow::Result<()> {
    let gitignore_path = project_root.join(".gitignore");
    let entry = format!("{}/", INDEX_DIR);

    let mut content = String::new();
    if gitignore_path.exists() {
        content = std::fs::read_to_string(&gitignore_path)?;
        if content.lines().any(|line| line.trim() == entry) {
            return Ok(());
        }
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
    }

    content.push_str(&entry);
    content.push('\n');
    std::fs::write(&gitignore_path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempdir().unwrap();
        assert_eq!(load_config(Some(&dir.path().join(CONFIG_FILE))).unwrap(), None);
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let config = DeclindexConfig {
            root: Some("app".to_string()),
            include: vec!["src/**.php".to_string()],
            respect_gitignore: true,
            ..Default::default()
        };

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.index_path(), PathBuf::from("app/.declindex/index.json"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "index = \"idx.json\"\n").unwrap();

        let config = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(config.index_path(), PathBuf::from("idx.json"));
        assert_eq!(config.root_dir(), PathBuf::from("."));
        assert!(config.include.is_empty());
        assert!(!config.respect_gitignore);
    }

    #[test]
    fn test_ensure_gitignore_appends_once() {
        let dir = tempdir().unwrap();
        let gitignore = dir.path().join(".gitignore");
        std::fs::write(&gitignore, "vendor/").unwrap();

        ensure_gitignore(dir.path()).unwrap();
        ensure_gitignore(dir.path()).unwrap();

        assert_eq!(std::fs::read_to_string(&gitignore).unwrap(), "vendor/\n.declindex/\n");
    }
}
