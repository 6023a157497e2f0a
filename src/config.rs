use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::repository::IsolationLevel;
use crate::{Error, Result};

/// Value of a location key that selects in-memory storage
pub const MEMORY: &str = "memory";

/// Repository configuration.
///
/// `storage_directory` is required. Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// `"memory"` or a directory for the SQLite statement store
    pub storage_directory: String,
    /// `"memory"` or a directory for the full-text index; no index when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_directory: Option<String>,
    #[serde(default)]
    pub default_isolation: IsolationLevel,
    /// Whether reads inside a transaction see its own pending writes
    #[serde(default = "default_read_own_writes")]
    pub read_own_writes: bool,
    /// Share blank node labels across loaded documents instead of scoping them per document
    #[serde(default)]
    pub preserve_blank_node_ids: bool,
}

fn default_read_own_writes() -> bool {
    true
}

/// Where a store keeps its data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    Memory,
    Directory(PathBuf),
}

impl StorageLocation {
    fn parse(key: &str, value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::Config(format!("{} must not be empty", key)));
        }
        if value.eq_ignore_ascii_case(MEMORY) || value == ":memory:" {
            Ok(StorageLocation::Memory)
        } else {
            Ok(StorageLocation::Directory(PathBuf::from(value)))
        }
    }
}

impl RepositoryConfig {
    /// Configuration with the given statement storage and no index
    pub fn new(storage_directory: impl Into<String>) -> Self {
        Self {
            storage_directory: storage_directory.into(),
            index_directory: None,
            default_isolation: IsolationLevel::default(),
            read_own_writes: default_read_own_writes(),
            preserve_blank_node_ids: false,
        }
    }

    /// Fully in-memory store and index
    pub fn memory() -> Self {
        Self::new(MEMORY).with_index(MEMORY)
    }

    pub fn with_index(mut self, index_directory: impl Into<String>) -> Self {
        self.index_directory = Some(index_directory.into());
        self
    }

    pub fn with_isolation(mut self, level: IsolationLevel) -> Self {
        self.default_isolation = level;
        self
    }

    pub fn with_read_own_writes(mut self, enabled: bool) -> Self {
        self.read_own_writes = enabled;
        self
    }

    pub fn with_preserved_blank_node_ids(mut self, preserve: bool) -> Self {
        self.preserve_blank_node_ids = preserve;
        self
    }

    /// Build from key/value parameters. Unrecognized keys are ignored.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut storage = None;
        let mut config = Self::new("");
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "storage_directory" => storage = Some(value.to_string()),
                "index_directory" => config.index_directory = Some(value.to_string()),
                "default_isolation" => config.default_isolation = value.parse()?,
                "read_own_writes" => {
                    config.read_own_writes = value.parse().map_err(|_| {
                        Error::Config(format!("read_own_writes must be true or false, got {:?}", value))
                    })?
                }
                "preserve_blank_node_ids" => {
                    config.preserve_blank_node_ids = value.parse().map_err(|_| {
                        Error::Config(format!("preserve_blank_node_ids must be true or false, got {:?}", value))
                    })?
                }
                other => tracing::debug!("Ignoring unknown configuration key {:?}", other),
            }
        }
        config.storage_directory =
            storage.ok_or_else(|| Error::Config("missing required key storage_directory".to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.storage()?;
        self.index()?;
        Ok(())
    }

    pub fn storage(&self) -> Result<StorageLocation> {
        StorageLocation::parse("storage_directory", &self.storage_directory)
    }

    pub fn index(&self) -> Result<Option<StorageLocation>> {
        self.index_directory
            .as_deref()
            .map(|dir| StorageLocation::parse("index_directory", dir))
            .transpose()
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("tristore.toml")
}

pub fn default_storage_path_in(base: &Path) -> PathBuf {
    base.join(".tristore").join("store")
}

pub fn default_index_path_in(base: &Path) -> PathBuf {
    base.join(".tristore").join("fulltext")
}

pub fn load_config(path: Option<&Path>) -> Result<Option<RepositoryConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config = RepositoryConfig::from_toml_str(&contents)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &RepositoryConfig, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::Config(format!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        )));
    }

    let contents = toml::to_string_pretty(config).map_err(|e| Error::Config(e.to_string()))?;
    ensure_dir(path)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_defaults_and_unknown_keys() {
        let config = RepositoryConfig::from_toml_str(
            r#"
            storage_directory = "data/store"
            lucene_analyzer = "standard"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage().unwrap(), StorageLocation::Directory(PathBuf::from("data/store")));
        assert_eq!(config.index().unwrap(), None);
        assert_eq!(config.default_isolation, IsolationLevel::ReadCommitted);
        assert!(config.read_own_writes);
        assert!(!config.preserve_blank_node_ids);
    }

    #[test]
    fn test_missing_storage_fails() {
        let err = RepositoryConfig::from_toml_str("index_directory = \"idx\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = RepositoryConfig::from_pairs([("index_directory", "memory")]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_pairs() {
        let config = RepositoryConfig::from_pairs([
            ("storage_directory", "memory"),
            ("index_directory", "/tmp/fulltext"),
            ("default_isolation", "serializable"),
            ("read_own_writes", "false"),
            ("preserve_blank_node_ids", "true"),
            ("something_else", "ignored"),
        ])
        .unwrap();
        assert_eq!(config.storage().unwrap(), StorageLocation::Memory);
        assert_eq!(
            config.index().unwrap(),
            Some(StorageLocation::Directory(PathBuf::from("/tmp/fulltext")))
        );
        assert_eq!(config.default_isolation, IsolationLevel::Serializable);
        assert!(!config.read_own_writes);
        assert!(config.preserve_blank_node_ids);
    }

    #[test]
    fn test_invalid_values() {
        assert!(RepositoryConfig::from_pairs([("storage_directory", "  ")]).is_err());
        assert!(RepositoryConfig::from_pairs([("storage_directory", "memory"), ("default_isolation", "snapshot")]).is_err());
        assert!(RepositoryConfig::from_pairs([("storage_directory", "memory"), ("read_own_writes", "yes")]).is_err());
    }

    #[test]
    fn test_write_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("tristore.toml");
        let config = RepositoryConfig::new("store").with_index("fulltext").with_isolation(IsolationLevel::None);

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());

        let loaded = load_config(Some(path.as_path())).unwrap().unwrap();
        assert_eq!(loaded, config);
        assert!(load_config(Some(dir.path().join("absent.toml").as_path())).unwrap().is_none());
    }
}
