use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::autosave::debounce::DebouncedMerge;
use crate::autosave::save::{
    SaveErrorCallback, SaveFn, SaveRequest, VersionCallback, VersionUpdate,
};
use crate::config::Config;

/// Accumulated changes for one entity between flushes.
///
/// Fields merge shallowly with last-write-wins per key; version and grouping
/// metadata keep the last non-`None` value supplied, so calls that omit them
/// do not erase what an earlier call recorded.
#[derive(Debug, Clone, Default)]
pub struct PendingChange {
    pub fields: Map<String, Value>,
    pub version: Option<i64>,
    pub group_key: Option<String>,
    pub group_index: Option<usize>,
}

impl PendingChange {
    pub(crate) fn merge(&mut self, incoming: PendingChange) {
        for (key, value) in incoming.fields {
            self.fields.insert(key, value);
        }
        if incoming.version.is_some() {
            self.version = incoming.version;
        }
        if incoming.group_key.is_some() {
            self.group_key = incoming.group_key;
        }
        if incoming.group_index.is_some() {
            self.group_index = incoming.group_index;
        }
    }
}

/// Builder for [`AutosaveBatcher`].
pub struct AutosaveBatcherBuilder {
    window: Duration,
    save: SaveFn,
    on_version: Option<VersionCallback>,
    on_error: Option<SaveErrorCallback>,
}

impl AutosaveBatcherBuilder {
    /// Override the inactivity window.
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Take the inactivity window from configuration.
    pub fn config(mut self, config: &Config) -> Self {
        self.window = Duration::from_secs(config.autosave_window_secs);
        self
    }

    /// Register the callback receiving [`VersionUpdate`]s after successful
    /// flushes that carried grouping metadata.
    pub fn on_version(mut self, f: impl Fn(VersionUpdate) + Send + Sync + 'static) -> Self {
        self.on_version = Some(Arc::new(f));
        self
    }

    /// Register the callback invoked with `(error, entity_id)` when a flush
    /// write fails. The failed pending data is discarded, not re-queued.
    pub fn on_error(mut self, f: impl Fn(String, i64) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> AutosaveBatcher {
        let live = Arc::new(AtomicBool::new(true));
        let save = self.save;
        let on_version = self.on_version;
        let on_error = self.on_error;

        let flush_live = live.clone();
        let queue = DebouncedMerge::new(
            self.window,
            Box::new(PendingChange::merge),
            Arc::new(
                move |entity_id: i64,
                      change: PendingChange|
                      -> Pin<Box<dyn Future<Output = ()> + Send>> {
                    let live = flush_live.clone();
                    let save = save.clone();
                    let on_version = on_version.clone();
                    let on_error = on_error.clone();
                    Box::pin(async move {
                        write_pending(entity_id, change, live, save, on_version, on_error).await;
                    })
                },
            ),
        );

        AutosaveBatcher { queue, live }
    }
}

/// Issue the write for a drained pending entry and route the outcome.
async fn write_pending(
    entity_id: i64,
    change: PendingChange,
    live: Arc<AtomicBool>,
    save: SaveFn,
    on_version: Option<VersionCallback>,
    on_error: Option<SaveErrorCallback>,
) {
    if change.fields.is_empty() {
        return;
    }

    let group_key = change.group_key;
    let group_index = change.group_index;
    let request = SaveRequest {
        entity_id,
        fields: change.fields,
        version: change.version.unwrap_or(1),
    };
    debug!(
        "Flushing {} field(s) for entity {} at version {}",
        request.fields.len(),
        entity_id,
        request.version
    );

    match save(request).await {
        Ok(new_version) => {
            // The batcher may have been disposed while the write was in
            // flight; the completion must then touch nothing.
            if !live.load(Ordering::SeqCst) {
                return;
            }
            if let (Some(group_key), Some(cb)) = (group_key, &on_version) {
                cb(VersionUpdate {
                    entity_id,
                    group_key,
                    group_index: group_index.unwrap_or(0),
                    version: new_version,
                });
            }
        }
        Err(e) => {
            warn!("Autosave flush failed for entity {}: {}", entity_id, e);
            if !live.load(Ordering::SeqCst) {
                return;
            }
            // Failed data stays discarded; the caller decides whether to
            // reload and resubmit.
            if let Some(cb) = &on_error {
                cb(e, entity_id);
            }
        }
    }
}

/// Debounced, batched write path for entity edits.
///
/// Rapid field-level edits to the same entity merge into a single pending
/// entry that is written once, one quiet window after the last edit, with
/// the version token for optimistic concurrency. The pending entry is
/// drained before the write starts, so edits during an in-flight write open
/// a fresh cycle instead of racing it.
#[derive(Clone)]
pub struct AutosaveBatcher {
    queue: DebouncedMerge<i64, PendingChange>,
    live: Arc<AtomicBool>,
}

impl AutosaveBatcher {
    /// Start building a batcher around the given persistence hook.
    pub fn builder(save: SaveFn) -> AutosaveBatcherBuilder {
        AutosaveBatcherBuilder {
            window: Duration::from_secs(Config::default().autosave_window_secs),
            save,
            on_version: None,
            on_error: None,
        }
    }

    /// Merge `fields` into the entity's pending changes and restart its
    /// inactivity timer.
    ///
    /// `version`, `group_key` and `group_index` update the recorded values
    /// only when supplied, so earlier values persist across calls that omit
    /// them.
    pub fn schedule(
        &self,
        entity_id: i64,
        fields: Map<String, Value>,
        version: Option<i64>,
        group_key: Option<String>,
        group_index: Option<usize>,
    ) {
        self.queue.push(
            entity_id,
            PendingChange {
                fields,
                version,
                group_key,
                group_index,
            },
        );
    }

    /// Shorthand for a [`schedule`](Self::schedule) call carrying fields only.
    pub fn schedule_fields(&self, entity_id: i64, fields: Map<String, Value>) {
        self.schedule(entity_id, fields, None, None, None);
    }

    /// Flush one entity now, if it has pending data. Returns whether a
    /// write was issued.
    pub async fn flush(&self, entity_id: i64) -> bool {
        self.queue.flush_key(&entity_id).await
    }

    /// Flush every entity with pending data. At most one write per entity;
    /// the pending map is empty afterwards regardless of write outcomes.
    pub async fn flush_all(&self) {
        self.queue.flush_all().await;
    }

    /// Drop every timer and pending entry without flushing.
    pub fn cancel_all(&self) {
        self.queue.cancel_all();
    }

    /// Terminal teardown: cancel everything, refuse further schedules and
    /// silence completion callbacks of in-flight writes.
    pub fn dispose(&self) {
        self.live.store(false, Ordering::SeqCst);
        self.queue.dispose();
    }

    /// Number of entities with pending data.
    pub fn pending_entities(&self) -> usize {
        self.queue.pending_len()
    }
}
