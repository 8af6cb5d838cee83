//! Storage worker shims: parse, persist, extract edges.
//!
//! Each shim checks its request, runs the blocking parser and store calls on
//! the blocking pool, and packs the outcome into an [`Envelope`]. Policy
//! (ordering, counting, timeouts) lives in the importer.

use async_trait::async_trait;
use serde_json::{json, Value};
use ssgkb_model::{SsgError, SsgResult};
use ssgkb_storage::Store;
use std::path::PathBuf;
use std::sync::Arc;

use crate::rpc::{Envelope, ImportRequest, StorageRpc};

#[derive(Clone)]
pub struct StorageHandlers {
    store: Arc<Store>,
}

impl StorageHandlers {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    async fn run<F>(&self, what: &'static str, job: F) -> Envelope
    where
        F: FnOnce(&Store) -> SsgResult<Value> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let result = match tokio::task::spawn_blocking(move || job(&store)).await {
            Ok(result) => result,
            Err(join) => Err(SsgError::Panic(format!("{what} handler: {join}"))),
        };
        if let Err(err) = &result {
            tracing::debug!(handler = what, error = %err, "handler failed");
        }
        result.into()
    }
}

fn required_path(request: &ImportRequest) -> SsgResult<PathBuf> {
    let path = request.path.trim();
    if path.is_empty() {
        return Err(SsgError::invalid("request is missing a path"));
    }
    Ok(PathBuf::from(path))
}

fn import_guide(store: &Store, path: PathBuf) -> SsgResult<Value> {
    let parsed = ssgkb_ingest_guide::parse_guide_file(&path)?;
    store.save_parsed_guide(&parsed)?;
    let edges = store.save_cross_references(&ssgkb_xref::extract_guide_edges(&parsed.guide))?;
    Ok(json!({
        "id": parsed.guide.id,
        "groups": parsed.groups.len(),
        "rules": parsed.rules.len(),
        "edges": edges,
    }))
}

fn import_table(store: &Store, path: PathBuf) -> SsgResult<Value> {
    let parsed = ssgkb_ingest_table::parse_table_file(&path)?;
    store.save_parsed_table(&parsed)?;
    let edges = store.save_cross_references(&ssgkb_xref::extract_table_edges(&parsed))?;
    Ok(json!({
        "id": parsed.table.id,
        "entries": parsed.entries.len(),
        "edges": edges,
    }))
}

fn import_manifest(store: &Store, path: PathBuf) -> SsgResult<Value> {
    let parsed = ssgkb_ingest_json::parse_manifest_file(&path)?;
    store.save_parsed_manifest(&parsed)?;
    let edges = store.save_cross_references(&ssgkb_xref::extract_manifest_edges(&parsed))?;
    Ok(json!({
        "id": parsed.manifest.id,
        "profiles": parsed.profiles.len(),
        "profile_rules": parsed.profile_rules.len(),
        "edges": edges,
    }))
}

fn import_data_stream(store: &Store, path: PathBuf) -> SsgResult<Value> {
    let parsed = ssgkb_ingest_xccdf::parse_data_stream_file(&path)?;
    store.save_parsed_data_stream(&parsed)?;
    let edges = store.save_cross_references(&ssgkb_xref::extract_data_stream_edges(&parsed))?;
    Ok(json!({
        "id": parsed.data_stream.id,
        "benchmark": parsed.benchmark.id,
        "profiles": parsed.profiles.len(),
        "groups": parsed.groups.len(),
        "rules": parsed.rules.len(),
        "edges": edges,
    }))
}

fn materialize(store: &Store) -> SsgResult<Value> {
    let initial = store.list_identifier_edges()?;
    let closure = ssgkb_xref::materialize(&initial);
    let inserted = store.save_cross_references(&closure)?;
    tracing::info!(
        identifier_edges = initial.len(),
        materialized = closure.len(),
        inserted,
        "cross-reference closure stored"
    );
    Ok(json!({
        "identifier_edges": initial.len(),
        "materialized": closure.len(),
        "inserted": inserted,
    }))
}

#[async_trait]
impl StorageRpc for StorageHandlers {
    async fn import_guide(&self, request: ImportRequest) -> Envelope {
        match required_path(&request) {
            Ok(path) => self.run("import_guide", move |s| import_guide(s, path)).await,
            Err(err) => Envelope::error(err.to_string()),
        }
    }

    async fn import_table(&self, request: ImportRequest) -> Envelope {
        match required_path(&request) {
            Ok(path) => self.run("import_table", move |s| import_table(s, path)).await,
            Err(err) => Envelope::error(err.to_string()),
        }
    }

    async fn import_manifest(&self, request: ImportRequest) -> Envelope {
        match required_path(&request) {
            Ok(path) => self.run("import_manifest", move |s| import_manifest(s, path)).await,
            Err(err) => Envelope::error(err.to_string()),
        }
    }

    async fn import_data_stream(&self, request: ImportRequest) -> Envelope {
        match required_path(&request) {
            Ok(path) => {
                self.run("import_data_stream", move |s| import_data_stream(s, path))
                    .await
            }
            Err(err) => Envelope::error(err.to_string()),
        }
    }

    async fn materialize_cross_references(&self) -> Envelope {
        self.run("materialize_cross_references", materialize).await
    }
}
