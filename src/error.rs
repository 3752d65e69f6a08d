//! Error taxonomy for library operations.
//!
//! Only `DocumentOpenFailure` ends a reading session. Everything else is
//! reported as a transient notice and the caller carries on.

use thiserror::Error;

use crate::domain::BookId;

/// Errors raised by the library, importer and reader
#[derive(Debug, Error)]
pub enum ShelfError {
    /// Upload rejected because the declared type is not PDF
    #[error("{file_name} is not a PDF file")]
    InvalidFileType { file_name: String },

    /// Metadata could not be read (non-fatal, defaults are used)
    #[error("failed to extract PDF metadata: {0}")]
    MetadataExtractionFailure(String),

    /// The document could not be opened for reading
    #[error("failed to load PDF: {0}")]
    DocumentOpenFailure(String),

    /// A single page failed to render
    #[error("failed to render page {page}: {reason}")]
    PageRenderFailure { page: u32, reason: String },

    /// The storage slot rejected a write for capacity reasons
    #[error("storage quota exceeded ({attempted} bytes, limit {limit})")]
    StorageQuotaExceeded { attempted: usize, limit: usize },

    #[error("no book with id {0}")]
    UnknownBook(BookId),

    #[error("a book with id {0} already exists")]
    DuplicateBook(BookId),

    #[error("page {page} is outside 1..={total_pages}")]
    PageOutOfRange { page: u32, total_pages: u32 },

    /// File bytes were evicted from storage; the book must be re-added
    #[error("file data for \"{title}\" is no longer stored, add the PDF again to read it")]
    MissingFileData { title: String },

    #[error("no book is open")]
    NoActiveBook,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ShelfError {
    /// Whether the error should tear down the reading session
    pub fn is_fatal_to_session(&self) -> bool {
        matches!(
            self,
            ShelfError::DocumentOpenFailure(_) | ShelfError::MissingFileData { .. }
        )
    }
}

pub type ShelfResult<T> = Result<T, ShelfError>;
