pub mod persisted;
pub mod store;

pub use persisted::Persisted;
pub use store::{FileStore, KeyValueStore, MemoryStore};

/// Build a namespaced local storage key, e.g. `hub:tools`
pub fn namespaced_key(prefix: &str, name: &str) -> String {
    format!("{}:{}", prefix, name)
}
