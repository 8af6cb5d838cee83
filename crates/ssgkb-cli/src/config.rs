//! `ssgkb` configuration: a JSON file (`--config`) with command-line flags
//! layered on top.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use ssgkb_importer::{ImporterConfig, SourceConfig};
use ssgkb_storage::StoreConfig;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub source: SourceConfig,
    pub importer: ImporterConfig,
}

/// Flag values that win over the file. `None` leaves the file's value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub db_path: Option<PathBuf>,
    pub source_root: Option<PathBuf>,
    pub file_timeout_secs: Option<u64>,
    pub skip_cross_references: bool,
}

impl AppConfig {
    /// Defaults when `path` is `None`; a missing or malformed file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn apply(mut self, overrides: &Overrides) -> Self {
        if let Some(db) = &overrides.db_path {
            self.store.db_path = db.clone();
        }
        if let Some(root) = &overrides.source_root {
            self.source.root = root.clone();
        }
        if let Some(secs) = overrides.file_timeout_secs {
            self.importer.file_timeout_secs = secs;
        }
        if overrides.skip_cross_references {
            self.importer.materialize_cross_references = false;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_keep_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ssgkb.json");
        fs::write(
            &path,
            r#"{ "source": { "root": "/srv/content", "guides_dir": "html-guides" },
                 "importer": { "file_timeout_secs": 60 } }"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.source.root, PathBuf::from("/srv/content"));
        assert_eq!(config.source.guides_dir, "html-guides");
        assert_eq!(config.source.tables_dir, "tables");
        assert_eq!(config.importer.file_timeout_secs, 60);
        assert_eq!(config.importer.pause_poll_millis, 1000);
        assert_eq!(config.store, StoreConfig::default());
    }

    #[test]
    fn flags_override_the_file() {
        let config = AppConfig::default().apply(&Overrides {
            db_path: Some("/tmp/kb.db".into()),
            file_timeout_secs: Some(5),
            skip_cross_references: true,
            ..Overrides::default()
        });
        assert_eq!(config.store.db_path, PathBuf::from("/tmp/kb.db"));
        assert_eq!(config.source.root, PathBuf::from("."));
        assert_eq!(config.importer.file_timeout_secs, 5);
        assert!(!config.importer.materialize_cross_references);
    }

    #[test]
    fn unreadable_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(Some(&dir.path().join("missing.json"))).is_err());
        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{ not json").unwrap();
        let err = AppConfig::load(Some(&bad)).unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }
}
