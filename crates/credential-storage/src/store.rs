//! High-level API for per-tenant credentials.

use crate::{
    tenant_key, CredentialBackend, CredentialBundle, FileBackend, MemoryBackend, StorageError,
    StorageResult,
};
use parking_lot::Mutex;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Stores and retrieves credential bundles by tenant.
///
/// Tenant identifiers are normalized with [`tenant_key`] on every call, so
/// `""` and `"default"` address the same bundle.
pub struct CredentialStore {
    backend: Box<dyn CredentialBackend>,
    // Serializes read-modify-write cycles issued through this store.
    write_lock: Mutex<()>,
}

impl CredentialStore {
    /// Create a store over the given backend.
    pub fn new(backend: Box<dyn CredentialBackend>) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
        }
    }

    /// Open the file-backed store at `path`.
    ///
    /// Creates parent directories and an empty collection when the file is
    /// missing. Fails when an existing file cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let backend = FileBackend::open(path)?;
        info!(path = %backend.path().display(), "Opened credential store");
        Ok(Self::new(Box::new(backend)))
    }

    /// Store with a process-local backend.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryBackend::new()))
    }

    /// Save `bundle` for `tenant`, replacing any previous bundle wholesale.
    pub fn save(&self, tenant: &str, bundle: CredentialBundle) -> StorageResult<()> {
        let key = tenant_key(tenant);

        let missing = bundle.missing_fields();
        if !missing.is_empty() {
            return Err(StorageError::Incomplete {
                tenant: key.to_string(),
                missing,
            });
        }

        let _guard = self.write_lock.lock();

        let mut collection = match self.backend.load() {
            Ok(collection) => collection.unwrap_or_default(),
            Err(StorageError::Read { path, source }) => {
                return Err(StorageError::Write { path, source })
            }
            Err(e) => return Err(e),
        };

        let replaced = collection.insert(key.to_string(), bundle).is_some();
        self.backend.store(&collection)?;

        info!(tenant = %key, replaced, "Saved credentials");
        Ok(())
    }

    /// Get the bundle stored for `tenant`.
    pub fn get(&self, tenant: &str) -> StorageResult<CredentialBundle> {
        let key = tenant_key(tenant);
        let collection = self.backend.load()?.unwrap_or_default();
        collection
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    /// Whether a bundle is stored for `tenant`. Any storage error counts as absent.
    pub fn exists(&self, tenant: &str) -> bool {
        match self.get(tenant) {
            Ok(_) => true,
            Err(StorageError::NotFound(_)) => false,
            Err(e) => {
                warn!(tenant = %tenant_key(tenant), error = %e, "Credential lookup failed");
                false
            }
        }
    }

    /// Every tenant key with stored credentials, sorted.
    pub fn list_tenants(&self) -> StorageResult<Vec<String>> {
        let collection = self.backend.load()?.unwrap_or_default();
        Ok(collection.into_keys().collect())
    }

    /// Make previous writes durable.
    pub fn flush(&self) -> StorageResult<()> {
        debug!(location = %self.backend.describe(), "Flushing credential store");
        self.backend.flush()
    }

    /// Where the collection lives, for logs.
    pub fn location(&self) -> String {
        self.backend.describe()
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("location", &self.backend.describe())
            .finish()
    }
}
