use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug)]
struct Pending<T> {
    sequence: u64,
    stored_at: Instant,
    value: T,
}

/// Concurrent map of correlation key to pending replies
///
/// Each stored value is handed out at most once. A second value stored under
/// a key that still holds one is queued behind it.
#[derive(Debug)]
pub struct ReplyStore<T> {
    entries: DashMap<String, VecDeque<Pending<T>>>,
    sequence: AtomicU64,
    stored: Notify,
}

impl<T> Default for ReplyStore<T> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            sequence: AtomicU64::new(0),
            stored: Notify::new(),
        }
    }
}

impl<T> ReplyStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, key: impl Into<String>, value: T) {
        let key = key.into();
        let pending = Pending {
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            stored_at: Instant::now(),
            value,
        };

        let queued = {
            let mut queue = self.entries.entry(key.clone()).or_default();
            queue.push_back(pending);
            queue.len()
        };
        if queued > 1 {
            debug!("Queued reply behind {} pending for key '{}'", queued - 1, key);
        }

        self.stored.notify_waiters();
    }

    /// Remove and return the oldest value stored under `selector`.
    ///
    /// An empty selector takes the oldest value across all keys.
    pub fn find_and_remove(&self, selector: &str) -> Option<T> {
        if selector.is_empty() {
            self.take_oldest()
        } else {
            self.take(selector)
        }
    }

    fn take(&self, key: &str) -> Option<T> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let pending = occupied.get_mut().pop_front();
                if occupied.get().is_empty() {
                    occupied.remove();
                }
                pending.map(|p| p.value)
            }
            Entry::Vacant(_) => None,
        }
    }

    fn take_oldest(&self) -> Option<T> {
        loop {
            let oldest = self
                .entries
                .iter()
                .filter_map(|entry| {
                    entry
                        .value()
                        .front()
                        .map(|p| (p.sequence, entry.key().clone()))
                })
                .min_by_key(|(sequence, _)| *sequence)
                .map(|(_, key)| key)?;

            // Another taker may have won the race for this key
            if let Some(value) = self.take(&oldest) {
                return Some(value);
            }
        }
    }

    /// Resolves on the next store after it is first polled
    pub fn notified(&self) -> tokio::sync::futures::Notified<'_> {
        self.stored.notified()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of pending values across all keys
    pub fn len(&self) -> usize {
        self.entries.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop values older than `max_age`, returning how many were dropped
    pub fn purge_expired(&self, max_age: Duration) -> usize {
        let mut purged = 0;
        self.entries.retain(|key, queue| {
            let before = queue.len();
            queue.retain(|p| p.stored_at.elapsed() < max_age);
            let dropped = before - queue.len();
            if dropped > 0 {
                debug!("Purged {} expired replies for key '{}'", dropped, key);
            }
            purged += dropped;
            !queue.is_empty()
        });
        purged
    }

    /// Drop every value for which `matches` holds, returning the count
    pub fn remove_where(&self, matches: impl Fn(&T) -> bool) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, queue| {
            let before = queue.len();
            queue.retain(|p| !matches(&p.value));
            removed += before - queue.len();
            !queue.is_empty()
        });
        removed
    }

    pub fn clear(&self) -> usize {
        let purged = self.len();
        self.entries.clear();
        purged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_store_and_take_once() {
        let store = ReplyStore::new();
        store.store("k1", "reply");

        assert!(store.contains("k1"));
        assert_eq!(store.find_and_remove("k1"), Some("reply"));
        assert_eq!(store.find_and_remove("k1"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_same_key_is_fifo() {
        let store = ReplyStore::new();
        store.store("k", 1);
        store.store("k", 2);

        assert_eq!(store.len(), 2);
        assert_eq!(store.find_and_remove("k"), Some(1));
        assert_eq!(store.find_and_remove("k"), Some(2));
    }

    #[test]
    fn test_empty_selector_takes_oldest() {
        let store = ReplyStore::new();
        store.store("b", "first");
        store.store("a", "second");

        assert_eq!(store.find_and_remove(""), Some("first"));
        assert_eq!(store.find_and_remove(""), Some("second"));
        assert_eq!(store.find_and_remove(""), None);
    }

    #[test]
    fn test_purge_expired() {
        let store = ReplyStore::new();
        store.store("old", 1);
        std::thread::sleep(Duration::from_millis(20));
        store.store("new", 2);

        assert_eq!(store.purge_expired(Duration::from_millis(10)), 1);
        assert!(!store.contains("old"));
        assert_eq!(store.clear(), 1);
    }

    #[test]
    fn test_remove_where_keeps_others() {
        let store = ReplyStore::new();
        store.store("k", 1);
        store.store("k", 2);
        store.store("other", 3);

        assert_eq!(store.remove_where(|v| *v != 2), 2);
        assert_eq!(store.len(), 1);
        assert!(!store.contains("other"));
        assert_eq!(store.find_and_remove("k"), Some(2));
    }

    #[test]
    fn test_concurrent_takers_get_value_once() {
        let store = Arc::new(ReplyStore::new());
        for i in 0..100 {
            store.store(format!("k{}", i % 10), i);
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let mut taken = Vec::new();
                    while let Some(value) = store.find_and_remove("") {
                        taken.push(value);
                    }
                    taken
                })
            })
            .collect();

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.join().unwrap());
        }
        let unique: HashSet<_> = all.iter().copied().collect();

        assert_eq!(all.len(), 100);
        assert_eq!(unique.len(), 100);
    }

    proptest! {
        #[test]
        fn prop_values_are_returned_at_most_once(keys in proptest::collection::vec("[a-c]", 1..30)) {
            let store = ReplyStore::new();
            for (i, key) in keys.iter().enumerate() {
                store.store(key.clone(), i);
            }

            let mut seen = HashSet::new();
            for key in ["a", "b", "c"] {
                while let Some(value) = store.find_and_remove(key) {
                    prop_assert!(seen.insert(value));
                }
            }
            prop_assert_eq!(seen.len(), keys.len());
            prop_assert!(store.is_empty());
        }
    }
}
