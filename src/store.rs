// Copyright 2023, Antoine Catton
//
// Permission to use, copy, modify, and/or distribute this software for any purpose with or without
// fee is hereby granted, provided that the above copyright notice and this permission notice
// appear in all copies.
//
// THE SOFTWARE IS PROVIDED “AS IS” AND THE AUTHOR DISCLAIMS ALL WARRANTIES WITH REGARD TO THIS
// SOFTWARE INCLUDING ALL IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS. IN NO EVENT SHALL THE
// AUTHOR BE LIABLE FOR ANY SPECIAL, DIRECT, INDIRECT, OR CONSEQUENTIAL DAMAGES OR ANY DAMAGES
// WHATSOEVER RESULTING FROM LOSS OF USE, DATA OR PROFITS, WHETHER IN AN ACTION OF CONTRACT,
// NEGLIGENCE OR OTHER TORTIOUS ACTION, ARISING OUT OF OR IN CONNECTION WITH THE USE OR PERFORMANCE
// OF THIS SOFTWARE.

//! In-memory mapping from key to (value, optional expiry deadline).
//!
//! Pure data; no time awareness. All operations are synchronous and total.

use std::collections::HashMap;
use std::sync::Mutex;

/// One stored value plus its optional absolute expiry deadline.
#[derive(Debug, Clone)]
struct StoreEntry {
    value: String,
    deadline: Option<f64>,
}

/// Shared, mutex-guarded key-value map.
///
/// Single coarse lock over the whole map.
#[derive(Debug, Default)]
pub struct Store {
    data: Mutex<HashMap<String, StoreEntry>>,
}

impl Store {
    pub fn new() -> Self {
        Store {
            data: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the current value, or `None` if absent. Does not look at
    /// the deadline.
    pub fn get(&self, key: &str) -> Option<String> {
        self.data.lock().unwrap().get(key).map(|e| e.value.clone())
    }

    /// Creates a fresh entry. Any existing deadline is discarded: this is
    /// observable as SET clearing TTL.
    pub fn set(&self, key: &str, value: String) {
        self.data.lock().unwrap().insert(
            key.to_string(),
            StoreEntry {
                value,
                deadline: None,
            },
        );
    }

    /// Removes the entry. Returns whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        self.data.lock().unwrap().remove(key).is_some()
    }

    /// Presence check; does not inspect the deadline.
    pub fn exists(&self, key: &str) -> bool {
        self.data.lock().unwrap().contains_key(key)
    }

    /// Sets the deadline on an existing entry. Returns `false` and makes no
    /// change if the key is absent.
    pub fn set_deadline(&self, key: &str, deadline: f64) -> bool {
        let mut guard = self.data.lock().unwrap();
        match guard.get_mut(key) {
            Some(entry) => {
                entry.deadline = Some(deadline);
                true
            }
            None => false,
        }
    }

    /// Returns the deadline if set; `None` otherwise (including absent keys).
    pub fn get_deadline(&self, key: &str) -> Option<f64> {
        self.data.lock().unwrap().get(key).and_then(|e| e.deadline)
    }

    /// Snapshot of current keys, suitable for random sampling. May be stale
    /// with respect to concurrent mutation; the expiry engine tolerates this.
    pub fn all_keys(&self) -> Vec<String> {
        self.data.lock().unwrap().keys().cloned().collect()
    }

    /// Atomically checks the deadline and removes the key if it has expired.
    pub(crate) fn expire_if_due(&self, key: &str, now: f64) -> bool {
        let mut guard = self.data.lock().unwrap();
        match guard.get(key) {
            Some(entry) => match entry.deadline {
                Some(deadline) if now >= deadline => {
                    guard.remove(key);
                    true
                }
                _ => false,
            },
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_missing_is_none() {
        let store = Store::new();
        assert_eq!(store.get("nope"), None);
    }

    #[test]
    fn set_then_get_roundtrips() {
        let store = Store::new();
        store.set("foo", "bar".to_string());
        assert_eq!(store.get("foo"), Some("bar".to_string()));
    }

    #[test]
    fn set_clears_existing_deadline() {
        let store = Store::new();
        store.set("k", "v".to_string());
        assert!(store.set_deadline("k", 100.0));
        store.set("k", "v2".to_string());
        assert_eq!(store.get_deadline("k"), None);
    }

    #[test]
    fn set_deadline_on_absent_key_fails() {
        let store = Store::new();
        assert!(!store.set_deadline("missing", 1.0));
    }

    #[test]
    fn delete_reports_prior_existence() {
        let store = Store::new();
        assert!(!store.delete("absent"));
        store.set("k", "v".to_string());
        assert!(store.delete("k"));
        assert!(!store.exists("k"));
    }

    #[test]
    fn all_keys_snapshot() {
        let store = Store::new();
        store.set("a", "1".to_string());
        store.set("b", "2".to_string());
        let mut keys = store.all_keys();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn expire_if_due_deletes_only_when_past_deadline() {
        let store = Store::new();
        store.set("k", "v".to_string());
        store.set_deadline("k", 100.0);
        assert!(!store.expire_if_due("k", 50.0));
        assert!(store.exists("k"));
        assert!(store.expire_if_due("k", 100.0));
        assert!(!store.exists("k"));
    }
}
