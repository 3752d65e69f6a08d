//! pdfshelf - Personal PDF library with reading progress
//!
//! Keeps a library of PDF books in a single persisted envelope, extracts
//! metadata and cover thumbnails on upload, and drives reading sessions that
//! remember the current page of every book.
//!
//! # Architecture
//!
//! - The catalog is the single owner of book records; every mutation is
//!   written through to the store before the in-memory list is replaced
//! - Reading sessions report page changes and bookmarks back to the catalog
//! - PDF decoding sits behind an engine trait; Pdfium is the shipped engine
//!
//! # Modules
//!
//! - `adapters`: Rendering engine integrations (Pdfium)
//! - `core`: Rendering, metadata extraction, import and the reader
//! - `domain`: Data structures (Book, BookPatch, ThemeMode)
//! - `library`: Storage slots, the persistent store, catalog and stats
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Add books
//! pdfshelf add ~/Downloads/*.pdf --tags work
//!
//! # Find and read
//! pdfshelf search rust async
//! pdfshelf read 1718000000000
//!
//! # Export a page
//! pdfshelf read 1718000000000 --page 12 --out page12.png --theme sepia
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod library;

// Re-export commonly used types
pub use adapters::{PdfEngine, PdfiumEngine};
pub use self::core::{Importer, MetadataExtractor, ReaderController, ReaderState};
pub use domain::{Book, BookId, BookPatch, ThemeMode};
pub use error::{ShelfError, ShelfResult};
pub use library::{Catalog, LibraryStore, SharedCatalog};
