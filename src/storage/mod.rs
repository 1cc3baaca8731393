use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

pub mod file_store;
pub mod memory_store;
pub mod token_store;

pub use file_store::FilePreferenceStore;
pub use memory_store::MemoryPreferenceStore;
pub use token_store::TokenStore;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt preference data: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// A batch of writes applied to a preference namespace in one step.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PreferenceEdit {
    ops: Vec<(String, Option<String>)>,
}

impl PreferenceEdit {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn put(mut self, key: &str, value: impl Into<String>) -> Self {
        self.ops.push((key.to_string(), Some(value.into())));
        self
    }

    #[must_use]
    pub fn remove(mut self, key: &str) -> Self {
        self.ops.push((key.to_string(), None));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Applies the operations in order; a later op on the same key wins.
    pub fn apply(&self, entries: &mut BTreeMap<String, String>) {
        for (key, value) in &self.ops {
            match value {
                Some(v) => {
                    entries.insert(key.clone(), v.clone());
                }
                None => {
                    entries.remove(key);
                }
            }
        }
    }
}

/// Durable string key-value storage, private to the application.
///
/// Implementations serialize their own operations. An [`PreferenceEdit`] is
/// applied entirely or not at all.
#[async_trait]
pub trait PreferenceStore: Send + Sync + std::fmt::Debug {
    /// Reads a single entry.
    ///
    /// # Errors
    /// Returns `StorageError` if the backing storage cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Applies a batch of puts and removes.
    ///
    /// # Errors
    /// Returns `StorageError` if the batch cannot be persisted.
    async fn edit(&self, edit: PreferenceEdit) -> Result<(), StorageError>;

    /// Removes every entry in the namespace.
    ///
    /// # Errors
    /// Returns `StorageError` if the backing storage cannot be wiped.
    async fn clear(&self) -> Result<(), StorageError>;
}
