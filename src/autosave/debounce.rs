use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Merge an incoming value into the pending one for a key.
pub type MergeFn<V> = Box<dyn Fn(&mut V, V) + Send + Sync>;

/// Consume a drained value. The future runs after the entry has already been
/// removed from the pending map.
pub type FlushFn<K, V> =
    Arc<dyn Fn(K, V) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

struct DebounceInner<K, V> {
    window: Duration,
    live: AtomicBool,
    pending: Mutex<HashMap<K, V>>,
    timers: Mutex<HashMap<K, JoinHandle<()>>>,
    merge: MergeFn<V>,
    flush: FlushFn<K, V>,
}

/// Debounce-and-merge: values pushed for a key are folded together with the
/// merge function, and the flush function runs once a quiet window has
/// elapsed after the *last* push for that key.
///
/// The pending entry is removed before the flush future starts, so pushes
/// arriving while a flush is in flight open a fresh entry and timer instead
/// of racing the in-flight one. That drain-then-flush step is the only
/// concurrency control.
pub struct DebouncedMerge<K, V> {
    inner: Arc<DebounceInner<K, V>>,
}

impl<K, V> Clone for DebouncedMerge<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> DebouncedMerge<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Send + 'static,
{
    pub fn new(window: Duration, merge: MergeFn<V>, flush: FlushFn<K, V>) -> Self {
        Self {
            inner: Arc::new(DebounceInner {
                window,
                live: AtomicBool::new(true),
                pending: Mutex::new(HashMap::new()),
                timers: Mutex::new(HashMap::new()),
                merge,
                flush,
            }),
        }
    }

    /// Merge `value` into the pending entry for `key` and restart its quiet
    /// window.
    pub fn push(&self, key: K, value: V) {
        if !self.inner.live.load(Ordering::SeqCst) {
            return;
        }
        {
            let mut pending = self.inner.pending.lock().unwrap();
            match pending.entry(key.clone()) {
                Entry::Occupied(mut entry) => (self.inner.merge)(entry.get_mut(), value),
                Entry::Vacant(entry) => {
                    entry.insert(value);
                }
            }
        }
        self.restart_timer(key);
    }

    fn restart_timer(&self, key: K) {
        let mut timers = self.inner.timers.lock().unwrap();
        if let Some(handle) = timers.remove(&key) {
            handle.abort();
        }
        let inner = self.inner.clone();
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(inner.window).await;
            if !inner.live.load(Ordering::SeqCst) {
                return;
            }
            inner.timers.lock().unwrap().remove(&task_key);
            let drained = inner.pending.lock().unwrap().remove(&task_key);
            if let Some(value) = drained {
                // Timer-driven flushes complete fire-and-forget.
                tokio::spawn((inner.flush)(task_key, value));
            }
        });
        timers.insert(key, handle);
    }

    /// Drain `key` and run its flush now, cancelling the timer. Returns
    /// whether anything was pending.
    pub async fn flush_key(&self, key: &K) -> bool {
        if let Some(handle) = self.inner.timers.lock().unwrap().remove(key) {
            handle.abort();
        }
        let drained = self.inner.pending.lock().unwrap().remove(key);
        match drained {
            Some(value) => {
                (self.inner.flush)(key.clone(), value).await;
                true
            }
            None => false,
        }
    }

    /// Drain and flush every pending entry.
    pub async fn flush_all(&self) {
        let keys: Vec<K> = self.inner.pending.lock().unwrap().keys().cloned().collect();
        for key in keys {
            self.flush_key(&key).await;
        }
    }

    /// Drop every timer and pending entry without flushing.
    pub fn cancel_all(&self) {
        let mut timers = self.inner.timers.lock().unwrap();
        for (_, handle) in timers.drain() {
            handle.abort();
        }
        drop(timers);
        self.inner.pending.lock().unwrap().clear();
    }

    /// Terminal teardown: cancel everything and refuse further pushes.
    pub fn dispose(&self) {
        self.inner.live.store(false, Ordering::SeqCst);
        self.cancel_all();
    }

    /// Number of keys with pending data.
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_queue(
        window: Duration,
    ) -> (DebouncedMerge<u32, Vec<u32>>, Arc<AtomicUsize>) {
        let flushes = Arc::new(AtomicUsize::new(0));
        let seen = flushes.clone();
        let queue = DebouncedMerge::new(
            window,
            Box::new(|pending: &mut Vec<u32>, mut incoming| pending.append(&mut incoming)),
            Arc::new(
                move |_key: u32, _value: Vec<u32>| -> Pin<Box<dyn Future<Output = ()> + Send>> {
                    let seen = seen.clone();
                    Box::pin(async move {
                        seen.fetch_add(1, Ordering::SeqCst);
                    })
                },
            ),
        );
        (queue, flushes)
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_window_counts_from_last_push() {
        let (queue, flushes) = counting_queue(Duration::from_secs(10));

        queue.push(1, vec![1]);
        tokio::time::sleep(Duration::from_secs(8)).await;
        queue.push(1, vec![2]);
        tokio::time::sleep(Duration::from_secs(8)).await;

        // 16s elapsed, but only 8s of quiet — nothing flushed yet.
        assert_eq!(flushes.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(flushes.load(Ordering::SeqCst), 1);
        assert_eq!(queue.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_discards_without_flushing() {
        let (queue, flushes) = counting_queue(Duration::from_secs(10));

        queue.push(1, vec![1]);
        queue.push(2, vec![2]);
        queue.cancel_all();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(flushes.load(Ordering::SeqCst), 0);
        assert_eq!(queue.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_refuses_further_pushes() {
        let (queue, flushes) = counting_queue(Duration::from_secs(10));

        queue.dispose();
        queue.push(1, vec![1]);
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(flushes.load(Ordering::SeqCst), 0);
        assert_eq!(queue.pending_len(), 0);
    }
}
