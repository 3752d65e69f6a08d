//! Key-value slots that hold the serialized library.
//!
//! A slot stores whole string values under a key. Writes replace the value
//! completely; a rejected write leaves the previous value in place.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors from a storage slot
#[derive(Debug, Error)]
pub enum SlotError {
    /// The value does not fit in the slot's capacity
    #[error("quota exceeded: {attempted} bytes, limit {limit}")]
    QuotaExceeded { attempted: usize, limit: usize },

    #[error("slot I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// String-keyed storage with whole-value writes
pub trait KvSlot: Send + Sync {
    /// Read the value under `key`, `None` if nothing was written
    fn read(&self, key: &str) -> Result<Option<String>, SlotError>;

    /// Replace the value under `key`
    fn write(&self, key: &str, value: &str) -> Result<(), SlotError>;

    /// Remove the value under `key` (no-op if absent)
    fn remove(&self, key: &str) -> Result<(), SlotError>;
}

fn check_quota(quota_bytes: Option<usize>, value: &str) -> Result<(), SlotError> {
    match quota_bytes {
        Some(limit) if value.len() > limit => Err(SlotError::QuotaExceeded {
            attempted: value.len(),
            limit,
        }),
        _ => Ok(()),
    }
}

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileSlot {
    dir: PathBuf,
    quota_bytes: Option<usize>,
}

impl FileSlot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            quota_bytes: None,
        }
    }

    /// Reject values larger than `quota_bytes`
    pub fn with_quota(mut self, quota_bytes: Option<usize>) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

impl KvSlot for FileSlot {
    fn read(&self, key: &str) -> Result<Option<String>, SlotError> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SlotError> {
        check_quota(self.quota_bytes, value)?;

        std::fs::create_dir_all(&self.dir)?;

        // Write next to the target and rename over it
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(value.as_bytes())?;
        tmp.flush()?;
        tmp.persist(self.path_for(key)).map_err(|e| e.error)?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SlotError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process slot, optionally capped
#[derive(Debug, Default)]
pub struct MemorySlot {
    values: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KvSlot for MemorySlot {
    fn read(&self, key: &str) -> Result<Option<String>, SlotError> {
        Ok(self.values().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SlotError> {
        check_quota(self.quota_bytes, value)?;
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SlotError> {
        self.values().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_slot_write_and_read() {
        let temp = TempDir::new().unwrap();
        let slot = FileSlot::new(temp.path().join("store"));

        assert!(slot.read("library").unwrap().is_none());

        slot.write("library", "{\"books\":[]}").unwrap();
        assert_eq!(slot.read("library").unwrap().unwrap(), "{\"books\":[]}");

        slot.write("library", "second").unwrap();
        assert_eq!(slot.read("library").unwrap().unwrap(), "second");
    }

    #[test]
    fn test_file_slot_quota_keeps_previous_value() {
        let temp = TempDir::new().unwrap();
        let slot = FileSlot::new(temp.path()).with_quota(Some(8));

        slot.write("k", "small").unwrap();
        let err = slot.write("k", "way too large").unwrap_err();

        assert!(matches!(
            err,
            SlotError::QuotaExceeded {
                attempted: 13,
                limit: 8
            }
        ));
        assert_eq!(slot.read("k").unwrap().unwrap(), "small");
    }

    #[test]
    fn test_file_slot_sanitizes_keys() {
        let slot = FileSlot::new("/tmp/shelf");
        assert_eq!(
            slot.path_for("../evil/key"),
            PathBuf::from("/tmp/shelf/.._evil_key.json")
        );
        assert_eq!(
            slot.path_for("pdfshelf-library"),
            PathBuf::from("/tmp/shelf/pdfshelf-library.json")
        );
    }

    #[test]
    fn test_file_slot_remove() {
        let temp = TempDir::new().unwrap();
        let slot = FileSlot::new(temp.path());

        slot.write("k", "v").unwrap();
        slot.remove("k").unwrap();
        assert!(slot.read("k").unwrap().is_none());

        // Removing twice is fine
        slot.remove("k").unwrap();
    }

    #[test]
    fn test_memory_slot_quota() {
        let slot = MemorySlot::with_quota(4);
        assert!(slot.write("k", "abcd").is_ok());
        assert!(slot.write("k", "abcde").is_err());
        assert_eq!(slot.read("k").unwrap().unwrap(), "abcd");
    }
}
