//! Shared cross-phase state store
//!
//! The `Blackboard` is the only mutable state shared between phases during a
//! run. Values are JSON (`serde_json::Value`), which covers the three shapes
//! phases exchange: scalars, ordered sequences and nested records.
//!
//! Reads and writes are linearizable per key: every `put` replaces the entry
//! under a write lock, so a `get` that starts after `put` returns sees the new
//! value (last-write-wins). A missing key is always reported as absent, never
//! as a default value; a stored JSON `null` is a real value.
//!
//! # Example
//!
//! ```
//! use phase_core::{Blackboard, BlackboardKey};
//!
//! const CLUSTER_COUNT: BlackboardKey<u32> = BlackboardKey::new("cluster_count");
//!
//! let board = Blackboard::new();
//! board.put_typed(&CLUSTER_COUNT, &5).unwrap();
//!
//! assert_eq!(board.get_typed(&CLUSTER_COUNT).unwrap(), 5);
//! assert!(board.get("missing").is_none());
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::trace;

/// Errors raised by typed blackboard access
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlackboardError {
    /// Nothing has been written under this key
    #[error("Blackboard key not found: {0}")]
    NotFound(String),

    /// The stored value does not have the shape the reader expected
    #[error("Blackboard key '{key}' does not hold a {expected}: {reason}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        reason: String,
    },

    /// The value could not be converted to JSON
    #[error("Failed to serialize value for '{key}': {reason}")]
    Serialization { key: String, reason: String },
}

/// A single stored value with its write time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlackboardEntry {
    pub key: String,
    pub value: Value,
    pub written_at: DateTime<Utc>,
}

/// A key name bound to the type stored under it
///
/// Declaring keys as constants gives every pipeline a single, documented key
/// schema and lets typed reads fail at the call site when the stored shape is
/// wrong.
pub struct BlackboardKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> BlackboardKey<T> {
    /// Declare a typed key
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// The raw key string
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for BlackboardKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for BlackboardKey<T> {}

impl<T> fmt::Debug for BlackboardKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlackboardKey")
            .field("name", &self.name)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> fmt::Display for BlackboardKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Thread-safe key/value store shared by all phases of a run
#[derive(Debug, Default)]
pub struct Blackboard {
    entries: RwLock<HashMap<String, BlackboardEntry>>,
}

impl Blackboard {
    /// Create an empty blackboard
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty blackboard behind an `Arc`, ready to hand to phases
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    // =========== Untyped Operations ===========

    /// Store a value, replacing any previous value for the key
    pub fn put(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        trace!(key = %key, "blackboard put");
        let entry = BlackboardEntry {
            key: key.clone(),
            value,
            written_at: Utc::now(),
        };
        self.write().insert(key, entry);
    }

    /// Get the latest entry for a key, or `None` if it was never written
    pub fn get(&self, key: &str) -> Option<BlackboardEntry> {
        self.read().get(key).cloned()
    }

    /// Get only the latest value for a key
    pub fn value(&self, key: &str) -> Option<Value> {
        self.read().get(key).map(|entry| entry.value.clone())
    }

    // =========== Typed Operations ===========

    /// Serialize and store a typed value
    pub fn put_typed<T: Serialize>(
        &self,
        key: &BlackboardKey<T>,
        value: &T,
    ) -> Result<(), BlackboardError> {
        let json = serde_json::to_value(value).map_err(|e| BlackboardError::Serialization {
            key: key.name().to_string(),
            reason: e.to_string(),
        })?;
        self.put(key.name(), json);
        Ok(())
    }

    /// Read a typed value
    ///
    /// Fails with `NotFound` when the key is absent and `TypeMismatch` when
    /// the stored value does not deserialize as `T`.
    pub fn get_typed<T: DeserializeOwned>(
        &self,
        key: &BlackboardKey<T>,
    ) -> Result<T, BlackboardError> {
        self.try_get_typed(key)?
            .ok_or_else(|| BlackboardError::NotFound(key.name().to_string()))
    }

    /// Read a typed value, treating absence as `Ok(None)`
    pub fn try_get_typed<T: DeserializeOwned>(
        &self,
        key: &BlackboardKey<T>,
    ) -> Result<Option<T>, BlackboardError> {
        match self.value(key.name()) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| BlackboardError::TypeMismatch {
                    key: key.name().to_string(),
                    expected: std::any::type_name::<T>(),
                    reason: e.to_string(),
                }),
        }
    }

    // =========== Inspection ===========

    /// Check if a key has been written
    pub fn contains_key(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Number of keys on the blackboard
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// All keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Point-in-time copy of every value, ordered by key
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.read()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }

    // A panic while holding the lock cannot leave a half-written entry
    // behind (insert is the only mutation), so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, BlackboardEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, BlackboardEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
