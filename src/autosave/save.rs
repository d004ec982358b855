use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

/// One write issued to the external persistence API: the merged partial
/// field map for an entity plus the version token for optimistic locking.
#[derive(Debug, Clone, Serialize)]
pub struct SaveRequest {
    pub entity_id: i64,
    pub fields: Map<String, Value>,
    pub version: i64,
}

/// Future returned by the persistence hook, resolving to the new version
/// token or an error message.
pub type SaveFuture = Pin<Box<dyn Future<Output = Result<i64, String>> + Send>>;

/// Persistence hook supplied at construction. The batcher shapes the request
/// and interprets the returned version; everything else about the write is
/// the collaborator's business.
pub type SaveFn = Arc<dyn Fn(SaveRequest) -> SaveFuture + Send + Sync>;

/// Version refresh routed back to the caller after a successful flush that
/// carried grouping metadata, so it can update its own optimistic-lock state
/// at the right location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionUpdate {
    pub entity_id: i64,
    pub group_key: String,
    pub group_index: usize,
    pub version: i64,
}

/// Callback for [`VersionUpdate`] notifications.
pub type VersionCallback = Arc<dyn Fn(VersionUpdate) + Send + Sync>;

/// Callback invoked with `(error, entity_id)` when a flush write fails.
pub type SaveErrorCallback = Arc<dyn Fn(String, i64) + Send + Sync>;
