//! Source snapshot access.
//!
//! The importer only talks to a [`SourceFetcher`]; where the snapshot comes
//! from (a git checkout, a release tarball, a directory on disk) is the
//! fetcher's business. [`LocalTreeFetcher`] serves a tree that is already
//! on disk.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ssgkb_model::{SsgError, SsgResult};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// The four input directories, in the order the importer visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceCategory {
    Tables,
    Guides,
    Manifests,
    Datastreams,
}

impl SourceCategory {
    pub const ORDER: [SourceCategory; 4] = [
        SourceCategory::Tables,
        SourceCategory::Guides,
        SourceCategory::Manifests,
        SourceCategory::Datastreams,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceCategory::Tables => "tables",
            SourceCategory::Guides => "guides",
            SourceCategory::Manifests => "manifests",
            SourceCategory::Datastreams => "datastreams",
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            SourceCategory::Tables | SourceCategory::Guides => "html",
            SourceCategory::Manifests => "json",
            SourceCategory::Datastreams => "xml",
        }
    }
}

impl fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Root of the source snapshot.
    pub root: PathBuf,
    pub guides_dir: String,
    pub tables_dir: String,
    pub manifests_dir: String,
    pub datastreams_dir: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            guides_dir: "guides".into(),
            tables_dir: "tables".into(),
            manifests_dir: "manifests".into(),
            datastreams_dir: "datastreams".into(),
        }
    }
}

impl SourceConfig {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Directory name of a category, relative to the root.
    pub fn dir_name(&self, category: SourceCategory) -> &str {
        match category {
            SourceCategory::Guides => &self.guides_dir,
            SourceCategory::Tables => &self.tables_dir,
            SourceCategory::Manifests => &self.manifests_dir,
            SourceCategory::Datastreams => &self.datastreams_dir,
        }
    }

    pub fn dir(&self, category: SourceCategory) -> PathBuf {
        self.root.join(self.dir_name(category))
    }
}

/// Result of a listing: file names relative to the source root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileList {
    pub files: Vec<String>,
    pub count: usize,
}

impl FileList {
    pub fn new(files: Vec<String>) -> Self {
        let count = files.len();
        Self { files, count }
    }
}

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Brings the snapshot up to date. Failure ends the run.
    async fn pull(&self) -> SsgResult<()>;

    /// Files of one category. Failure ends the run.
    async fn list(&self, category: SourceCategory) -> SsgResult<FileList>;

    /// Absolute path of a listed file.
    async fn file_path(&self, filename: &str) -> SsgResult<PathBuf>;
}

/// Fetcher over a directory tree already present on disk.
#[derive(Debug, Clone)]
pub struct LocalTreeFetcher {
    config: SourceConfig,
}

impl LocalTreeFetcher {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }
}

fn list_dir(root: &Path, dir_name: &str, extension: &str) -> Result<Vec<String>, String> {
    let dir = root.join(dir_name);
    if !dir.is_dir() {
        return Err(format!("{} is not a directory", dir.display()));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| e.to_string())?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if Path::new(name.as_ref()).extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        files.push(format!("{dir_name}/{name}"));
    }
    Ok(files)
}

#[async_trait]
impl SourceFetcher for LocalTreeFetcher {
    async fn pull(&self) -> SsgResult<()> {
        if self.config.root.is_dir() {
            tracing::debug!(root = %self.config.root.display(), "using local source tree");
            Ok(())
        } else {
            Err(SsgError::FetchFailed(format!(
                "source root {} is not a directory",
                self.config.root.display()
            )))
        }
    }

    async fn list(&self, category: SourceCategory) -> SsgResult<FileList> {
        let root = self.config.root.clone();
        let dir_name = self.config.dir_name(category).to_string();
        let listed = tokio::task::spawn_blocking(move || {
            list_dir(&root, &dir_name, category.extension())
        })
        .await
        .map_err(|e| e.to_string())
        .and_then(|r| r);
        match listed {
            Ok(files) => Ok(FileList::new(files)),
            Err(message) => Err(SsgError::ListFailed {
                category: category.to_string(),
                message,
            }),
        }
    }

    async fn file_path(&self, filename: &str) -> SsgResult<PathBuf> {
        let relative = Path::new(filename);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if filename.trim().is_empty() || escapes {
            return Err(SsgError::invalid(format!(
                "file name {filename:?} is not inside the source tree"
            )));
        }
        let path = self.config.root.join(relative);
        if !path.is_file() {
            return Err(SsgError::not_found("source file", filename));
        }
        Ok(std::path::absolute(&path).unwrap_or(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["guides", "tables", "manifests", "datastreams"] {
            fs::create_dir(dir.path().join(sub)).unwrap();
        }
        fs::write(dir.path().join("guides/ssg-rhel9-guide-stig.html"), "").unwrap();
        fs::write(dir.path().join("guides/ssg-al2023-guide-cis.html"), "").unwrap();
        fs::write(dir.path().join("guides/README.md"), "").unwrap();
        fs::create_dir(dir.path().join("guides/nested")).unwrap();
        fs::write(dir.path().join("manifests/manifest-rhel9.json"), "{}").unwrap();
        dir
    }

    #[tokio::test]
    async fn lists_sorted_files_with_the_category_extension() {
        let dir = tree();
        let fetcher = LocalTreeFetcher::new(SourceConfig::with_root(dir.path()));
        fetcher.pull().await.unwrap();

        let guides = fetcher.list(SourceCategory::Guides).await.unwrap();
        assert_eq!(
            guides.files,
            vec![
                "guides/ssg-al2023-guide-cis.html".to_string(),
                "guides/ssg-rhel9-guide-stig.html".to_string(),
            ]
        );
        assert_eq!(guides.count, 2);
        assert_eq!(fetcher.list(SourceCategory::Tables).await.unwrap().count, 0);

        let path = fetcher.file_path(&guides.files[0]).await.unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("guides/ssg-al2023-guide-cis.html"));
    }

    #[tokio::test]
    async fn missing_directories_fail_listing() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = LocalTreeFetcher::new(SourceConfig::with_root(dir.path()));
        let err = fetcher.list(SourceCategory::Datastreams).await.unwrap_err();
        assert!(matches!(err, SsgError::ListFailed { ref category, .. } if category == "datastreams"));
        assert!(err.is_run_fatal());
    }

    #[tokio::test]
    async fn pull_fails_without_a_root() {
        let fetcher = LocalTreeFetcher::new(SourceConfig::with_root("/nonexistent/ssg/source"));
        assert!(matches!(fetcher.pull().await, Err(SsgError::FetchFailed(_))));
    }

    #[tokio::test]
    async fn file_paths_stay_inside_the_root() {
        let dir = tree();
        let fetcher = LocalTreeFetcher::new(SourceConfig::with_root(dir.path()));
        assert!(matches!(
            fetcher.file_path("../etc/passwd").await,
            Err(SsgError::InvalidFormat(_))
        ));
        assert!(matches!(
            fetcher.file_path("guides/missing.html").await,
            Err(SsgError::NotFound { .. })
        ));
    }
}
