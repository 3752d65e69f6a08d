//! Persistent library store.
//!
//! The whole book list lives in one slot as a JSON envelope:
//!
//! ```text
//! { "books": [ ... ], "lastUpdated": "2024-05-01T10:00:00Z" }
//! ```
//!
//! Every save rewrites the envelope. When the slot runs out of room the
//! save is retried once with all file bytes stripped, so metadata and
//! progress survive and the affected books must be re-added to be read.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{Book, BookId, BookPatch};
use crate::error::{ShelfError, ShelfResult};

use super::slot::{KvSlot, SlotError};

/// Default slot key for the library envelope
pub const DEFAULT_STORAGE_KEY: &str = "pdfshelf-library";

/// Serialized form of the library
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub books: Vec<Book>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeRef<'a> {
    books: &'a [Book],
    last_updated: DateTime<Utc>,
}

/// How a save landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Everything was written
    Complete,

    /// Quota forced a retry without file bytes
    FilesDropped { dropped: usize },
}

/// Library persistence over a single slot key
#[derive(Clone)]
pub struct LibraryStore {
    slot: Arc<dyn KvSlot>,
    key: String,
}

impl LibraryStore {
    pub fn new(slot: Arc<dyn KvSlot>, key: impl Into<String>) -> Self {
        Self {
            slot,
            key: key.into(),
        }
    }

    /// Store using [`DEFAULT_STORAGE_KEY`]
    pub fn with_default_key(slot: Arc<dyn KvSlot>) -> Self {
        Self::new(slot, DEFAULT_STORAGE_KEY)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Write the full book list
    pub fn save(&self, books: &[Book]) -> ShelfResult<SaveOutcome> {
        let json = serialize_envelope(books)?;

        match self.slot.write(&self.key, &json) {
            Ok(()) => {
                debug!(books = books.len(), bytes = json.len(), "Library saved");
                Ok(SaveOutcome::Complete)
            }
            Err(SlotError::QuotaExceeded { attempted, limit }) => {
                warn!(
                    attempted,
                    limit, "Storage quota exceeded, retrying without file data"
                );

                let dropped = books.iter().filter(|b| b.file.is_some()).count();
                let stripped: Vec<Book> = books
                    .iter()
                    .cloned()
                    .map(|mut book| {
                        book.file = None;
                        book
                    })
                    .collect();

                let json = serialize_envelope(&stripped)?;
                self.slot.write(&self.key, &json).map_err(slot_error)?;

                Ok(SaveOutcome::FilesDropped { dropped })
            }
            Err(e) => Err(slot_error(e)),
        }
    }

    /// Read the book list; missing or unreadable data yields an empty list
    pub fn load(&self) -> Vec<Book> {
        self.load_envelope().map(|e| e.books).unwrap_or_default()
    }

    /// When the envelope was last written
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.load_envelope().map(|e| e.last_updated)
    }

    fn load_envelope(&self) -> Option<Envelope> {
        let raw = match self.slot.read(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %self.key, "Failed to read library: {}", e);
                return None;
            }
        };

        match serde_json::from_str::<Envelope>(&raw) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                warn!(key = %self.key, "Discarding unreadable library data: {}", e);
                None
            }
        }
    }

    /// Load, patch the matching book, save
    pub fn update_by_id(&self, id: &BookId, patch: &BookPatch) -> ShelfResult<Vec<Book>> {
        let mut books = self.load();
        for book in books.iter_mut().filter(|b| &b.id == id) {
            book.apply(patch);
        }

        self.save(&books)?;
        Ok(books)
    }

    /// Load, drop the matching book, save
    pub fn delete_by_id(&self, id: &BookId) -> ShelfResult<Vec<Book>> {
        let mut books = self.load();
        books.retain(|b| &b.id != id);

        self.save(&books)?;
        Ok(books)
    }

    /// Replace the library with an empty list
    pub fn clear(&self) -> ShelfResult<()> {
        self.save(&[])?;
        Ok(())
    }
}

fn serialize_envelope(books: &[Book]) -> ShelfResult<String> {
    let envelope = EnvelopeRef {
        books,
        last_updated: Utc::now(),
    };
    Ok(serde_json::to_string(&envelope)?)
}

fn slot_error(e: SlotError) -> ShelfError {
    match e {
        SlotError::QuotaExceeded { attempted, limit } => {
            ShelfError::StorageQuotaExceeded { attempted, limit }
        }
        SlotError::Io(e) => ShelfError::Io(e),
    }
}
