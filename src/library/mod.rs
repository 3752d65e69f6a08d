//! Book library management.
//!
//! The library keeps every book record in a single key-value slot.
//!
//! # Storage Layout
//!
//! ```text
//! ~/.pdfshelf/
//! ├── config.yaml                  # optional, see crate::config
//! └── store/
//!     └── pdfshelf-library.json    # {"books": [...], "lastUpdated": "..."}
//! ```

pub mod catalog;
pub mod slot;
pub mod stats;
pub mod store;

pub use catalog::{Catalog, SharedCatalog, SortKey, DEFAULT_RECENT_LIMIT};
pub use slot::{FileSlot, KvSlot, MemorySlot, SlotError};
pub use stats::{progress_percent, LibraryStats};
pub use store::{Envelope, LibraryStore, SaveOutcome, DEFAULT_STORAGE_KEY};
