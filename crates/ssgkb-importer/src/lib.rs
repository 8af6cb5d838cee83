//! # SSG knowledge-base importer
//!
//! Pulls a source snapshot, walks its four input directories and feeds every
//! file through the storage worker:
//!
//! ```text
//! ┌──────────────┐  pull/list/path  ┌───────────────┐
//! │ SourceFetcher│◄─────────────────│ ImportManager │
//! └──────────────┘                  └───────┬───────┘
//!                                           │ import_* / materialize
//!                                   ┌───────▼────────┐     ┌───────┐
//!                                   │ StorageHandlers│────►│ Store │
//!                                   └────────────────┘     └───────┘
//! ```
//!
//! The manager only speaks the [`SourceFetcher`] and [`StorageRpc`] traits,
//! so tests swap either side for an in-memory double.

pub mod fetcher;
pub mod handlers;
pub mod job;
pub mod rpc;

pub use fetcher::{FileList, LocalTreeFetcher, SourceCategory, SourceConfig, SourceFetcher};
pub use handlers::StorageHandlers;
pub use job::{CategoryProgress, ImportManager, ImportRun, ImporterConfig, Phase, RunState};
pub use rpc::{Envelope, ImportRequest, StorageRpc};
