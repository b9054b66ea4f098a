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

//! Two-tier key expiration: a passive check-and-delete invoked synchronously
//! from the executor, and a background active sweeper with an adaptive
//! continuation rule.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::seq::SliceRandom;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::clock::Clock;
use crate::error::ExpiryLifecycleError;
use crate::store::Store;

/// Default tuning for the active sweeper. Overridable via CLI flags so
/// test harnesses can shrink the sample size.
pub const DEFAULT_SAMPLE_SIZE: usize = 20;
pub const DEFAULT_THRESHOLD_PERCENT: f64 = 25.0;

/// Owns the passive-check logic and the active sweeper's lifecycle.
pub struct ExpiryEngine {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    sample_size: usize,
    threshold_percent: f64,
    running: AtomicBool,
    stop_notify: Arc<Notify>,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ExpiryEngine {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>) -> Self {
        Self::with_tuning(store, clock, DEFAULT_SAMPLE_SIZE, DEFAULT_THRESHOLD_PERCENT)
    }

    pub fn with_tuning(
        store: Arc<Store>,
        clock: Arc<dyn Clock>,
        sample_size: usize,
        threshold_percent: f64,
    ) -> Self {
        ExpiryEngine {
            store,
            clock,
            sample_size,
            threshold_percent,
            running: AtomicBool::new(false),
            stop_notify: Arc::new(Notify::new()),
            task: std::sync::Mutex::new(None),
        }
    }

    /// Passive path: if `key` is present, has a deadline, and that deadline
    /// is in the past, delete it and return true. Must be called by the
    /// executor before any read or deadline-query on a key (not before SET).
    pub fn check_and_remove_expired(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.store.expire_if_due(key, now)
    }

    /// Starts the background active-expiry task. Fails if already running.
    pub fn start(self: &Arc<Self>) -> Result<(), ExpiryLifecycleError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ExpiryLifecycleError::AlreadyRunning);
        }

        log::info!("starting active expiry task");
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.run_active_expiry().await });
        *self.task.lock().unwrap() = Some(handle);
        Ok(())
    }

    /// Stops the background task and awaits its termination. Idempotent.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        log::info!("stopping active expiry task...");
        self.stop_notify.notify_waiters();

        let handle = self.task.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        log::info!("active expiry task stopped");
    }

    async fn run_active_expiry(self: Arc<Self>) {
        log::info!("active expiry task started");
        loop {
            tokio::select! {
                _ = sleep(Duration::from_secs(1)) => {}
                _ = self.stop_notify.notified() => break,
            }
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            self.active_expiry_cycle().await;
        }
        log::info!("active expiry task finished");
    }

    /// One cycle: repeatedly sample up to `sample_size` keys and delete the
    /// expired ones, looping again immediately while the deletion rate stays
    /// above the threshold, ending the cycle once it drops at or below it.
    async fn active_expiry_cycle(&self) {
        loop {
            if !self.running.load(Ordering::SeqCst) {
                return;
            }

            let all_keys = self.store.all_keys();
            if all_keys.is_empty() {
                return;
            }

            let n = self.sample_size.min(all_keys.len());
            let sampled: Vec<&String> = {
                let mut rng = rand::thread_rng();
                all_keys.choose_multiple(&mut rng, n).collect()
            };

            let deleted = sampled
                .iter()
                .filter(|key| self.check_and_remove_expired(key))
                .count();

            let deletion_rate = (deleted as f64 / n as f64) * 100.0;
            if deletion_rate <= self.threshold_percent {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FakeClock;

    fn engine_with(store: Arc<Store>, now: f64) -> (Arc<ExpiryEngine>, Arc<FakeClock>) {
        let clock = Arc::new(FakeClock::new(now));
        let engine = Arc::new(ExpiryEngine::new(store, clock.clone()));
        (engine, clock)
    }

    #[test]
    fn passive_check_ignores_keys_without_deadline() {
        let store = Arc::new(Store::new());
        store.set("k", "v".to_string());
        let (engine, _clock) = engine_with(store.clone(), 1000.0);
        assert!(!engine.check_and_remove_expired("k"));
        assert!(store.exists("k"));
    }

    #[test]
    fn passive_check_ignores_absent_keys() {
        let store = Arc::new(Store::new());
        let (engine, _clock) = engine_with(store, 1000.0);
        assert!(!engine.check_and_remove_expired("ghost"));
    }

    #[test]
    fn passive_check_deletes_once_deadline_passes() {
        let store = Arc::new(Store::new());
        store.set("k", "v".to_string());
        store.set_deadline("k", 1010.0);
        let (engine, clock) = engine_with(store.clone(), 1000.0);

        assert!(!engine.check_and_remove_expired("k"));
        assert!(store.exists("k"));

        clock.set(1010.0);
        assert!(engine.check_and_remove_expired("k"));
        assert!(!store.exists("k"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn start_twice_is_a_lifecycle_error() {
        let store = Arc::new(Store::new());
        let (engine, _clock) = engine_with(store, 0.0);
        engine.start().unwrap();
        assert_eq!(engine.start(), Err(ExpiryLifecycleError::AlreadyRunning));
        engine.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_is_idempotent() {
        let store = Arc::new(Store::new());
        let (engine, _clock) = engine_with(store, 0.0);
        engine.stop().await;
        engine.start().unwrap();
        engine.stop().await;
        engine.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn active_cycle_never_removes_live_keys() {
        let store = Arc::new(Store::new());
        for i in 0..30 {
            store.set(&format!("k{i}"), "v".to_string());
        }
        // half expired, half not, relative to now=1000
        for i in 0..15 {
            store.set_deadline(&format!("k{i}"), 500.0);
        }
        for i in 15..30 {
            store.set_deadline(&format!("k{i}"), 5000.0);
        }
        let (engine, _clock) = engine_with(store.clone(), 1000.0);
        engine.active_expiry_cycle().await;

        for i in 0..15 {
            assert!(!store.exists(&format!("k{i}")), "k{i} should have expired");
        }
        for i in 15..30 {
            assert!(store.exists(&format!("k{i}")), "k{i} is still live");
        }
    }
}
