//! Durable backends for serialized group documents.
//!
//! The core never looks inside a backend: it hands over `(group id, document)`
//! pairs and expects every call to be write-through, i.e. once `save` returns a
//! fresh `load_all` (even from another process) sees the new document.

pub mod directory;
pub mod error;
pub mod memory;
pub mod redis_store;

use std::future::Future;

pub use directory::DirectoryBackend;
pub use error::BackendError;
pub use memory::MemoryBackend;
pub use redis_store::RedisBackend;

/// One entry found by [`GroupBackend::load_all`]. A single unreadable entry
/// carries its own error instead of failing the whole load.
#[derive(Debug)]
pub struct StoredDocument {
    pub id: String,
    pub document: Result<String, BackendError>,
}

impl StoredDocument {
    pub fn ok(id: impl Into<String>, document: String) -> Self {
        Self {
            id: id.into(),
            document: Ok(document),
        }
    }
}

pub trait GroupBackend: Send + Sync + 'static {
    /// Every stored entry, in no particular order. Only a failure to list the
    /// backend at all is an error here.
    fn load_all(&self) -> impl Future<Output = Result<Vec<StoredDocument>, BackendError>> + Send;

    /// Insert or replace the document stored for `id`.
    fn save(
        &self,
        id: &str,
        document: String,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Drop the document stored for `id`. Deleting an unknown id is not an error.
    fn delete(&self, id: &str) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Backend selected at startup.
#[derive(Clone)]
pub enum Backend {
    Redis(RedisBackend),
    Directory(DirectoryBackend),
    Memory(MemoryBackend),
}

impl Backend {
    pub fn kind(&self) -> &'static str {
        match self {
            Backend::Redis(_) => "redis",
            Backend::Directory(_) => "directory",
            Backend::Memory(_) => "memory",
        }
    }
}

impl GroupBackend for Backend {
    async fn load_all(&self) -> Result<Vec<StoredDocument>, BackendError> {
        match self {
            Backend::Redis(b) => b.load_all().await,
            Backend::Directory(b) => b.load_all().await,
            Backend::Memory(b) => b.load_all().await,
        }
    }

    async fn save(&self, id: &str, document: String) -> Result<(), BackendError> {
        match self {
            Backend::Redis(b) => b.save(id, document).await,
            Backend::Directory(b) => b.save(id, document).await,
            Backend::Memory(b) => b.save(id, document).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<(), BackendError> {
        match self {
            Backend::Redis(b) => b.delete(id).await,
            Backend::Directory(b) => b.delete(id).await,
            Backend::Memory(b) => b.delete(id).await,
        }
    }
}

impl From<MemoryBackend> for Backend {
    fn from(value: MemoryBackend) -> Self {
        Backend::Memory(value)
    }
}

impl From<DirectoryBackend> for Backend {
    fn from(value: DirectoryBackend) -> Self {
        Backend::Directory(value)
    }
}

impl From<RedisBackend> for Backend {
    fn from(value: RedisBackend) -> Self {
        Backend::Redis(value)
    }
}
