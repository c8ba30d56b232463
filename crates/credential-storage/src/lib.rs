//! Per-tenant Jira credential storage for the gateway.
//!
//! Credentials live in one collection keyed by tenant (space) identifier:
//! - **File**: a single JSON object on disk, rewritten atomically with 0600 permissions
//! - **Memory**: process-local, for tests and embedding
//!
//! [`CredentialStore`] is the high-level API. Every read reloads the
//! collection from its backend, so edits made by another process are seen
//! without a restart. Writes rewrite the whole collection.

mod bundle;
mod file;
mod memory;
mod store;
mod traits;

pub use bundle::{tenant_key, CredentialBundle, CredentialCollection, DEFAULT_TENANT_KEY};
pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use store::CredentialStore;
pub use traits::CredentialBackend;

use std::path::PathBuf;
use thiserror::Error;

/// Error type for credential storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The collection could not be written
    #[error("failed to write credentials to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The collection exists but could not be read
    #[error("failed to read credentials from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The collection exists but is not valid JSON of the expected shape
    #[error("credentials file {path} is malformed: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Encoding error while serializing the collection
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// No bundle stored for the tenant
    #[error("credentials not found for space: {0}")]
    NotFound(String),

    /// A bundle with empty required fields was offered for saving
    #[error("incomplete credentials for space '{tenant}': missing {}", missing.join(", "))]
    Incomplete {
        tenant: String,
        missing: Vec<&'static str>,
    },
}

/// Result type for credential storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
