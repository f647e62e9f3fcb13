use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

/// Key used when a caller does not name its operation
pub const DEFAULT_KEY: &str = "default";

/// Registry of named loading flags.
///
/// A key is present only while its operation is in flight; `stop_loading`
/// removes it, so "never started" and "finished" read the same.
#[derive(Debug, Clone, Default)]
pub struct LoadingRegistry {
    flags: Arc<Mutex<HashMap<String, bool>>>,
}

impl LoadingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_loading(&self, key: &str) {
        tracing::trace!(key, "loading started");
        self.flags.lock().insert(key.to_string(), true);
    }

    pub fn stop_loading(&self, key: &str) {
        tracing::trace!(key, "loading stopped");
        self.flags.lock().remove(key);
    }

    pub fn is_loading_key(&self, key: &str) -> bool {
        self.flags.lock().contains_key(key)
    }

    /// True while any key is in flight
    pub fn is_loading(&self) -> bool {
        !self.flags.lock().is_empty()
    }

    /// Keys currently in flight, sorted
    pub fn active_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.flags.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Mark `key` as loading until the returned guard is dropped
    pub fn acquire(&self, key: &str) -> LoadingGuard {
        self.start_loading(key);
        LoadingGuard {
            registry: self.clone(),
            key: key.to_string(),
        }
    }

    /// Run `operation` with `key` marked as loading.
    ///
    /// The flag is cleared when the operation returns `Ok`, returns `Err`, or
    /// when the returned future is dropped before completion. The operation's
    /// result is passed through untouched.
    pub async fn with_loading<T, E, F, Fut>(&self, key: &str, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let _guard = self.acquire(key);
        operation().await
    }
}

/// Clears its loading key on drop
#[derive(Debug)]
pub struct LoadingGuard {
    registry: LoadingRegistry,
    key: String,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.registry.stop_loading(&self.key);
    }
}

/// Fixed set of keys that all start out loading
#[derive(Debug, Clone)]
pub struct MultiLoading {
    states: Arc<Mutex<HashMap<String, bool>>>,
}

impl MultiLoading {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let states = keys.into_iter().map(|k| (k.into(), true)).collect();
        Self {
            states: Arc::new(Mutex::new(states)),
        }
    }

    /// Update one tracked key. Keys outside the initial set are ignored.
    pub fn set_loading(&self, key: &str, loading: bool) {
        let mut states = self.states.lock();
        match states.get_mut(key) {
            Some(state) => *state = loading,
            None => tracing::warn!(key, "ignoring loading update for untracked key"),
        }
    }

    pub fn is_loading(&self, key: &str) -> bool {
        self.states.lock().get(key).copied().unwrap_or(false)
    }

    pub fn is_all_loading(&self) -> bool {
        let states = self.states.lock();
        !states.is_empty() && states.values().all(|loading| *loading)
    }

    pub fn is_any_loading(&self) -> bool {
        self.states.lock().values().any(|loading| *loading)
    }

    pub fn loading_keys(&self) -> HashSet<String> {
        self.states
            .lock()
            .iter()
            .filter(|(_, loading)| **loading)
            .map(|(key, _)| key.clone())
            .collect()
    }
}
