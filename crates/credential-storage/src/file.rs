//! JSON file backend.
//!
//! The collection is one pretty-printed JSON object. Writes go to a sibling
//! temporary file that is fsynced and renamed over the target, so readers see
//! either the old or the new collection, never a partial one. The file is
//! owner read/write only (0600) on unix.

use crate::{CredentialBackend, CredentialCollection, StorageError, StorageResult};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::debug;

/// Credential collection stored in a single JSON file.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Create a backend for `path` without touching the file system.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create the parent directory and an empty collection if the file is
    /// missing; otherwise verify the existing file parses.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let backend = Self::new(path);

        if let Some(parent) = backend.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StorageError::Write {
                    path: backend.path.clone(),
                    source,
                })?;
            }
        }

        if backend.load()?.is_none() {
            backend.store(&CredentialCollection::new())?;
            debug!(path = %backend.path.display(), "Created empty credentials file");
        }

        Ok(backend)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialBackend for FileBackend {
    fn load(&self) -> StorageResult<Option<CredentialCollection>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let collection =
            serde_json::from_slice(&data).map_err(|source| StorageError::Format {
                path: self.path.clone(),
                source,
            })?;
        Ok(Some(collection))
    }

    fn store(&self, collection: &CredentialCollection) -> StorageResult<()> {
        let content = serde_json::to_vec_pretty(collection)?;
        atomic_write_private(&self.path, &content).map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn flush(&self) -> StorageResult<()> {
        match fs::File::open(&self.path) {
            Ok(file) => file.sync_all().map_err(|source| StorageError::Write {
                path: self.path.clone(),
                source,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Write {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

fn atomic_write_private(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid credentials path"))?;

    let tmp_path = dir.join(format!(
        ".{}.tmp.{}.{}",
        file_name,
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ));

    let write_result = (|| -> io::Result<()> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&tmp_path)?;
        file.write_all(content)?;
        file.sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp_path, path)?;

        if let Ok(parent_dir) = fs::File::open(&dir) {
            let _ = parent_dir.sync_all();
        }

        Ok(())
    })();

    if write_result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }

    write_result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CredentialBundle;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file_is_none() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("jira_credentials.json"));
        assert!(backend.load().unwrap().is_none());
    }

    #[test]
    fn test_open_creates_empty_collection() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("jira_credentials.json");

        let backend = FileBackend::open(&path).unwrap();

        assert!(path.exists());
        assert_eq!(backend.load().unwrap(), Some(CredentialCollection::new()));
    }

    #[test]
    fn test_open_rejects_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jira_credentials.json");
        fs::write(&path, "not json").unwrap();

        let result = FileBackend::open(&path);
        assert!(matches!(result, Err(StorageError::Format { .. })));
    }

    #[test]
    fn test_store_writes_camel_case_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jira_credentials.json");
        let backend = FileBackend::new(&path);

        let mut collection = CredentialCollection::new();
        collection.insert(
            "S1".to_string(),
            CredentialBundle::new("https://x.atlassian.net", "a@b.com", "tok"),
        );
        backend.store(&collection).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["S1"]["instanceUrl"], "https://x.atlassian.net");
        assert_eq!(raw["S1"]["apiToken"], "tok");

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty(), "temporary files must not be left behind");
    }

    #[cfg(unix)]
    #[test]
    fn test_store_sets_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("jira_credentials.json");
        let backend = FileBackend::new(&path);
        backend.store(&CredentialCollection::new()).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_store_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("missing").join("creds.json"));

        let result = backend.store(&CredentialCollection::new());
        assert!(matches!(result, Err(StorageError::Write { .. })));
    }

    #[test]
    fn test_flush_missing_file_is_ok() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("creds.json"));
        assert!(backend.flush().is_ok());
    }
}
