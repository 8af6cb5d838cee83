//! Request/response shapes between the importer and the storage worker.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ssgkb_model::SsgResult;

use crate::fetcher::SourceCategory;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub path: String,
}

impl ImportRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Reply of every storage RPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Envelope {
    Ok {
        #[serde(default)]
        payload: Value,
    },
    Error {
        error: String,
    },
}

impl Envelope {
    pub fn ok(payload: Value) -> Self {
        Envelope::Ok { payload }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Envelope::Error {
            error: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Envelope::Ok { .. })
    }

    pub fn into_result(self) -> Result<Value, String> {
        match self {
            Envelope::Ok { payload } => Ok(payload),
            Envelope::Error { error } => Err(error),
        }
    }

    /// Decodes a reply received as JSON; anything undecodable becomes an
    /// error envelope.
    pub fn from_json(raw: &str) -> Self {
        serde_json::from_str(raw)
            .unwrap_or_else(|e| Envelope::error(format!("malformed response: {e}")))
    }
}

impl From<SsgResult<Value>> for Envelope {
    fn from(result: SsgResult<Value>) -> Self {
        match result {
            Ok(payload) => Envelope::ok(payload),
            Err(err) => Envelope::error(err.to_string()),
        }
    }
}

#[async_trait]
pub trait StorageRpc: Send + Sync {
    async fn import_guide(&self, request: ImportRequest) -> Envelope;
    async fn import_table(&self, request: ImportRequest) -> Envelope;
    async fn import_manifest(&self, request: ImportRequest) -> Envelope;
    async fn import_data_stream(&self, request: ImportRequest) -> Envelope;
    async fn materialize_cross_references(&self) -> Envelope;

    /// Routes a file to the import RPC of its category.
    async fn import(&self, category: SourceCategory, request: ImportRequest) -> Envelope {
        match category {
            SourceCategory::Tables => self.import_table(request).await,
            SourceCategory::Guides => self.import_guide(request).await,
            SourceCategory::Manifests => self.import_manifest(request).await,
            SourceCategory::Datastreams => self.import_data_stream(request).await,
        }
    }
}
