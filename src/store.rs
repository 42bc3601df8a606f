//! Client-side key-value storage, the local equivalent of browser storage.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::errors::{Error, Result};

pub const REGISTRATION_SUCCESS_KEY: &str = "registrationSuccess";
pub const USER_KEY: &str = "user";
pub const TOKEN_KEY: &str = "token";

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: String) -> Result<()>;
    /// Remove `key`, returning the previous value.
    fn remove(&self, key: &str) -> Result<Option<String>>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Store("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.remove(key))
    }
}

pub fn put_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    store.set(key, serde_json::to_string(value)?)
}

pub fn get_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Read and remove a JSON value in one step. The entry is gone even when it
/// fails to parse.
pub fn take_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    match store.remove(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_derive::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        text: String,
    }

    #[test]
    fn take_json_consumes_entry() -> Result<()> {
        let store = MemoryStore::new();
        put_json(&store, "note", &Note { text: "hi".into() })?;

        let first: Option<Note> = take_json(&store, "note")?;
        assert_eq!(first, Some(Note { text: "hi".into() }));
        let second: Option<Note> = take_json(&store, "note")?;
        assert_eq!(second, None);
        Ok(())
    }

    #[test]
    fn malformed_entry_is_an_error() -> Result<()> {
        let store = MemoryStore::new();
        store.set("note", "{not json".to_string())?;
        let parsed: Result<Option<Note>> = get_json(&store, "note");
        assert!(matches!(parsed, Err(Error::Json(_))));
        Ok(())
    }
}
