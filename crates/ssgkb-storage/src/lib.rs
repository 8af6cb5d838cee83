//! SSG knowledge base store
//!
//! Typed persistence for every parsed entity plus the cross-reference edge
//! table, on a single SQLite database:
//!
//! ```text
//! guides ─┬─ guide_groups            tables ── table_entries
//!         └─ guide_rules ── rule_references
//!                                    manifests ── profiles ── profile_rules
//! data_streams ── benchmarks ─┬─ ds_profiles ── ds_profile_rules
//!                             ├─ ds_groups
//!                             └─ ds_rules ─┬─ ds_rule_references
//!                                          └─ ds_rule_identifiers
//! cross_references  (append-only, unique per edge)
//! ```
//!
//! ## Semantics
//!
//! - Every `save_*` is an idempotent upsert on the primary key; `created_at`
//!   of an existing row is kept.
//! - Entities with owned collections (rules, DS rules, DS profiles) are saved
//!   in one transaction: upsert root, delete owned rows, insert owned rows.
//! - `save_parsed_*` replace everything hanging off a root in one transaction.
//! - `list_*` return a [`Page`] whose `total` counts filtered rows before
//!   pagination. Ordering is by primary key, so pages concatenate to the
//!   unpaginated result.
//! - Cross-references are unique on all columns except `id`/`created_at`;
//!   duplicates are ignored on insert.
//!
//! The connection sits behind a `parking_lot::Mutex`; each operation holds it
//! for its own statement or transaction only.

mod datastreams;
mod guides;
mod manifests;
mod query;
mod schema;
mod tables;
mod xrefs;


use parking_lot::Mutex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use ssgkb_model::SsgError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub use datastreams::{DsGroupFilter, DsRuleFilter};
pub use guides::{GroupFilter, GuideFilter, RuleFilter};
pub use manifests::ProfileFilter;
pub use ssgkb_model::{Page, PageRequest};
pub use tables::TableFilter;

// ============================================================================
// Configuration
// ============================================================================

/// Default database file, relative to the working directory.
pub const DEFAULT_DB_FILE: &str = "ssgkb.db";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file; `:memory:` opens a private in-memory database.
    pub db_path: PathBuf,
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE),
            busy_timeout_secs: 30,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid metadata json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

impl From<StoreError> for SsgError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, id } => SsgError::NotFound { kind, id },
            other => SsgError::IoWrite(other.to_string()),
        }
    }
}

// ============================================================================
// Store
// ============================================================================

pub struct Store {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Store {
    /// Open (or create) the database named by `config` and bring the schema
    /// up to date.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        if config.db_path.as_os_str() == ":memory:" {
            return Self::open_in_memory();
        }
        let conn = Connection::open(&config.db_path)?;
        conn.busy_timeout(Duration::from_secs(config.busy_timeout_secs))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::init(conn, Some(config.db_path.clone()))
    }

    pub fn open_path(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open(&StoreConfig {
            db_path: path.as_ref().to_path_buf(),
            ..StoreConfig::default()
        })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", "OFF")?;
        schema::migrate(&conn)?;
        tracing::debug!(
            path = %path.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| ":memory:".into()),
            "store opened"
        );
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Runs `f` inside a transaction; any error rolls everything back.
    fn with_tx<T>(&self, f: impl FnOnce(&rusqlite::Transaction<'_>) -> StoreResult<T>) -> StoreResult<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}
