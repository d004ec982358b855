//! Autosave batcher behavior: merge semantics, debounce windows, flush
//! draining and the discard-on-failure policy.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Map, Value};

use colabri_presence::{AutosaveBatcher, SaveFuture, SaveRequest, VersionUpdate};

fn fields(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Save hook that records every request and fails for one chosen entity.
fn recording_save(
    requests: Arc<Mutex<Vec<SaveRequest>>>,
    fail_entity: Option<i64>,
) -> colabri_presence::SaveFn {
    Arc::new(move |request: SaveRequest| -> SaveFuture {
        let requests = requests.clone();
        Box::pin(async move {
            let entity_id = request.entity_id;
            let version = request.version;
            requests.lock().unwrap().push(request);
            if fail_entity == Some(entity_id) {
                Err("persistence unavailable".to_string())
            } else {
                Ok(version + 1)
            }
        })
    })
}

#[tokio::test(start_paused = true)]
async fn test_rapid_edits_merge_into_single_versioned_write() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let batcher = AutosaveBatcher::builder(recording_save(requests.clone(), None))
        .window(Duration::from_secs(120))
        .build();

    batcher.schedule(7, fields(&[("a", json!(1))]), None, None, None);
    tokio::time::sleep(Duration::from_secs(5)).await;
    batcher.schedule(7, fields(&[("b", json!(2))]), Some(3), None, None);

    tokio::time::sleep(Duration::from_secs(121)).await;

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1, "both edits must land in one write");
    assert_eq!(requests[0].entity_id, 7);
    assert_eq!(requests[0].fields, fields(&[("a", json!(1)), ("b", json!(2))]));
    assert_eq!(requests[0].version, 3);
}

#[tokio::test(start_paused = true)]
async fn test_merge_is_last_write_wins_and_metadata_persists() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let versions = Arc::new(Mutex::new(Vec::new()));
    let batcher = AutosaveBatcher::builder(recording_save(requests.clone(), None))
        .window(Duration::from_secs(120))
        .on_version({
            let versions = versions.clone();
            move |update: VersionUpdate| versions.lock().unwrap().push(update)
        })
        .build();

    batcher.schedule(
        5,
        fields(&[("a", json!(1)), ("b", json!(1))]),
        Some(2),
        Some("rows".to_string()),
        Some(4),
    );
    // Omitting version/group must not erase what the first call recorded.
    batcher.schedule(5, fields(&[("a", json!(9))]), None, None, None);

    assert!(batcher.flush(5).await);

    {
        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].fields, fields(&[("a", json!(9)), ("b", json!(1))]));
        assert_eq!(requests[0].version, 2);
    }

    let versions = versions.lock().unwrap();
    assert_eq!(
        *versions,
        vec![VersionUpdate {
            entity_id: 5,
            group_key: "rows".to_string(),
            group_index: 4,
            version: 3,
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_each_schedule_resets_the_inactivity_timer() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let batcher = AutosaveBatcher::builder(recording_save(requests.clone(), None))
        .window(Duration::from_secs(120))
        .build();

    batcher.schedule(1, fields(&[("a", json!(1))]), None, None, None);
    tokio::time::sleep(Duration::from_secs(100)).await;
    batcher.schedule(1, fields(&[("a", json!(2))]), None, None, None);
    tokio::time::sleep(Duration::from_secs(100)).await;
    batcher.schedule(1, fields(&[("a", json!(3))]), None, None, None);

    // 315s after the first edit, but only 115s after the last one.
    tokio::time::sleep(Duration::from_secs(115)).await;
    assert!(requests.lock().unwrap().is_empty());

    tokio::time::sleep(Duration::from_secs(6)).await;
    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1, "one flush, timed from the last edit");
    assert_eq!(requests[0].fields, fields(&[("a", json!(3))]));
}

#[tokio::test(start_paused = true)]
async fn test_flush_all_drains_every_entity_once() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let batcher = AutosaveBatcher::builder(recording_save(requests.clone(), Some(2)))
        .window(Duration::from_secs(120))
        .on_error({
            let errors = errors.clone();
            move |err, id| errors.lock().unwrap().push((err, id))
        })
        .build();

    batcher.schedule(1, fields(&[("a", json!(1))]), None, None, None);
    batcher.schedule(2, fields(&[("b", json!(2))]), None, None, None);
    batcher.schedule(3, fields(&[("c", json!(3))]), None, None, None);

    batcher.flush_all().await;

    let mut ids: Vec<i64> = requests.lock().unwrap().iter().map(|r| r.entity_id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3], "exactly one write per entity");
    // Empty afterwards regardless of the failed write for entity 2.
    assert_eq!(batcher.pending_entities(), 0);
    assert_eq!(errors.lock().unwrap().as_slice(), &[("persistence unavailable".to_string(), 2)]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_flush_discards_and_reports_once() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let batcher = AutosaveBatcher::builder(recording_save(requests.clone(), Some(9)))
        .window(Duration::from_secs(30))
        .on_error({
            let errors = errors.clone();
            move |err, id| errors.lock().unwrap().push((err, id))
        })
        .build();

    batcher.schedule(9, fields(&[("a", json!(1))]), None, None, None);
    assert!(batcher.flush(9).await);

    assert_eq!(errors.lock().unwrap().as_slice(), &[("persistence unavailable".to_string(), 9)]);
    assert_eq!(batcher.pending_entities(), 0);

    // A later edit starts a fresh cycle; the failed fields are not re-queued.
    batcher.schedule(9, fields(&[("b", json!(2))]), None, None, None);
    assert_eq!(batcher.pending_entities(), 1);
    tokio::time::sleep(Duration::from_secs(31)).await;

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].fields, fields(&[("b", json!(2))]));
}

#[tokio::test(start_paused = true)]
async fn test_version_defaults_to_one_when_never_supplied() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let batcher = AutosaveBatcher::builder(recording_save(requests.clone(), None))
        .window(Duration::from_secs(120))
        .build();

    batcher.schedule_fields(11, fields(&[("a", json!("x"))]));
    assert!(batcher.flush(11).await);

    assert_eq!(requests.lock().unwrap()[0].version, 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_version_callback_without_grouping_metadata() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let versions: Arc<Mutex<Vec<VersionUpdate>>> = Arc::new(Mutex::new(Vec::new()));
    let batcher = AutosaveBatcher::builder(recording_save(requests.clone(), None))
        .window(Duration::from_secs(120))
        .on_version({
            let versions = versions.clone();
            move |update| versions.lock().unwrap().push(update)
        })
        .build();

    batcher.schedule(4, fields(&[("a", json!(1))]), Some(7), None, None);
    assert!(batcher.flush(4).await);

    assert_eq!(requests.lock().unwrap().len(), 1);
    assert!(versions.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_all_discards_timers_and_pending() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let batcher = AutosaveBatcher::builder(recording_save(requests.clone(), None))
        .window(Duration::from_secs(30))
        .build();

    batcher.schedule(1, fields(&[("a", json!(1))]), None, None, None);
    batcher.schedule(2, fields(&[("b", json!(2))]), None, None, None);
    batcher.cancel_all();
    assert_eq!(batcher.pending_entities(), 0);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(requests.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_flush_of_empty_entity_is_a_no_op() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let batcher = AutosaveBatcher::builder(recording_save(requests.clone(), None))
        .window(Duration::from_secs(30))
        .build();

    assert!(!batcher.flush(42).await);
    assert!(requests.lock().unwrap().is_empty());
}
