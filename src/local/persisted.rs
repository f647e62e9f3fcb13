use super::store::KeyValueStore;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// A value cached in memory and written through to the local store on
/// every change. The store is read once, at construction.
pub struct Persisted<T> {
    store: Arc<dyn KeyValueStore>,
    key: String,
    value: Arc<RwLock<T>>,
}

impl<T> Clone for Persisted<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            key: self.key.clone(),
            value: self.value.clone(),
        }
    }
}

impl<T> Persisted<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Load `key`, falling back to `fallback` when absent or unparsable
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>, fallback: T) -> Self {
        let key = key.into();
        let value = match store.get(&key) {
            Some(raw) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("Discarding malformed local value for {}: {}", key, e);
                    fallback
                }
            },
            None => fallback,
        };

        Self {
            store,
            key,
            value: Arc::new(RwLock::new(value)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Read through a closure without cloning the whole value
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.read())
    }

    pub fn set(&self, value: T) {
        let mut current = self.value.write();
        *current = value;
        self.write_through(&current);
    }

    /// Mutate in place and write the result through
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut current = self.value.write();
        let result = f(&mut current);
        self.write_through(&current);
        result
    }

    fn write_through(&self, value: &T) {
        let outcome = serde_json::to_string(value)
            .map_err(crate::errors::AppError::from)
            .and_then(|raw| self.store.set(&self.key, &raw));

        if let Err(e) = outcome {
            tracing::error!("Failed to persist local value {}: {}", self.key, e);
        }
    }
}
