//! In-memory backend, used by tests and embedders that manage persistence themselves.

use crate::{CredentialBackend, CredentialCollection, StorageResult};
use parking_lot::Mutex;

/// Keeps the collection in process memory.
#[derive(Default)]
pub struct MemoryBackend {
    data: Mutex<Option<CredentialCollection>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing collection.
    pub fn with_collection(collection: CredentialCollection) -> Self {
        Self {
            data: Mutex::new(Some(collection)),
        }
    }
}

impl CredentialBackend for MemoryBackend {
    fn load(&self) -> StorageResult<Option<CredentialCollection>> {
        let data = self.data.lock();
        Ok(data.clone())
    }

    fn store(&self, collection: &CredentialCollection) -> StorageResult<()> {
        let mut data = self.data.lock();
        *data = Some(collection.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
