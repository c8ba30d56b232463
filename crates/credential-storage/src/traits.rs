//! Storage trait definitions.

use crate::{CredentialCollection, StorageResult};

/// Backend that persists the whole credential collection as one unit.
pub trait CredentialBackend: Send + Sync {
    /// Load the full collection.
    ///
    /// Returns `Ok(None)` when nothing has ever been stored (e.g. the
    /// backing file is missing).
    fn load(&self) -> StorageResult<Option<CredentialCollection>>;

    /// Replace the full collection.
    fn store(&self, collection: &CredentialCollection) -> StorageResult<()>;

    /// Make previous writes durable. Backends without buffering do nothing.
    fn flush(&self) -> StorageResult<()> {
        Ok(())
    }

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}
