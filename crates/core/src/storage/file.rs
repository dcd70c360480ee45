use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use super::{KeyValueStore, StorageError};

/// Stores each key as `<root>/<encoded key>.json`.
///
/// Keys are percent-encoded outside `[A-Za-z0-9_-]`, so distinct keys never
/// share a file and no key can escape the root.
///
/// Writes go to a temporary file in the same directory which is then renamed over
/// the target, so a crash mid-write never leaves a truncated snapshot behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the entries.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing the given key.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", encode_key(key)))
    }
}

impl KeyValueStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Read {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn write(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let write_err = |source| StorageError::Write {
            key: key.to_string(),
            source,
        };
        fs::create_dir_all(&self.root).map_err(write_err)?;
        let mut tmp = NamedTempFile::new_in(&self.root).map_err(write_err)?;
        tmp.write_all(value).map_err(write_err)?;
        tmp.persist(self.path_for(key))
            .map_err(|err| write_err(err.error))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Remove {
                key: key.to_string(),
                source,
            }),
        }
    }
}

fn encode_key(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for byte in input.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_') {
            result.push(char::from(byte));
        } else {
            result.push_str(&format!("%{byte:02X}"));
        }
    }
    result
}
