//! In-memory backend.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::{BackendError, GroupBackend, StoredDocument};

/// In-memory backend for development and testing.
///
/// Clones share the same map, so a test can keep a handle and inspect what the
/// store wrote. All data is lost on restart.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    documents: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Document currently stored for `id`.
    pub fn get(&self, id: &str) -> Result<Option<String>, BackendError> {
        Ok(self
            .documents
            .read()
            .map_err(|e| BackendError::Lock(e.to_string()))?
            .get(id)
            .cloned())
    }

    pub fn contains(&self, id: &str) -> Result<bool, BackendError> {
        Ok(self
            .documents
            .read()
            .map_err(|e| BackendError::Lock(e.to_string()))?
            .contains_key(id))
    }

    pub fn len(&self) -> Result<usize, BackendError> {
        Ok(self
            .documents
            .read()
            .map_err(|e| BackendError::Lock(e.to_string()))?
            .len())
    }

    pub fn is_empty(&self) -> Result<bool, BackendError> {
        Ok(self.len()? == 0)
    }
}

impl GroupBackend for MemoryBackend {
    async fn load_all(&self) -> Result<Vec<StoredDocument>, BackendError> {
        Ok(self
            .documents
            .read()
            .map_err(|e| BackendError::Lock(e.to_string()))?
            .iter()
            .map(|(id, document)| StoredDocument::ok(id.as_str(), document.clone()))
            .collect())
    }

    async fn save(&self, id: &str, document: String) -> Result<(), BackendError> {
        self.documents
            .write()
            .map_err(|e| BackendError::Lock(e.to_string()))?
            .insert(id.to_string(), document);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), BackendError> {
        self.documents
            .write()
            .map_err(|e| BackendError::Lock(e.to_string()))?
            .remove(id);
        Ok(())
    }
}
