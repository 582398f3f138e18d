//! Storage for a single value.

use std::sync::{Mutex, PoisonError};

use crate::error::StorageError;

/// Storage, possibly persistent, for a single object.
///
/// `put(None)` and `delete()` are equivalent and idempotent. A value read back
/// with `get()` is semantically equal to the one written, not the same
/// instance: persistent implementations round-trip through serialization.
pub trait ObjectStore<T>: Send + Sync {
    /// True iff a stored value exists.
    fn contains(&self) -> bool;

    /// Returns the stored value, or `None` if nothing is stored.
    fn get(&self) -> Result<Option<T>, StorageError>;

    /// Replaces the stored value. `None` deletes it.
    fn put(&self, value: Option<&T>) -> Result<(), StorageError>;

    fn delete(&self) -> Result<(), StorageError> {
        self.put(None)
    }
}

/// Non-persistent store that keeps a clone of the value, for tests and for
/// callers that do not need durability.
pub struct MemoryStore<T> {
    contents: Mutex<Option<T>>,
}

impl<T: Clone + Send> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            contents: Mutex::new(None),
        }
    }

    pub fn with_value(value: T) -> Self {
        Self {
            contents: Mutex::new(Some(value)),
        }
    }
}

impl<T: Clone + Send> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send> ObjectStore<T> for MemoryStore<T> {
    fn contains(&self) -> bool {
        self.contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn get(&self) -> Result<Option<T>, StorageError> {
        Ok(self
            .contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn put(&self, value: Option<&T>) -> Result<(), StorageError> {
        *self.contents.lock().unwrap_or_else(PoisonError::into_inner) = value.cloned();
        Ok(())
    }
}
