//! Core reading logic.
//!
//! This module contains:
//! - Render: drawing surfaces and theme treatment
//! - Metadata: best-effort extraction on upload
//! - Import: the upload boundary
//! - Reader: the reading session controller

pub mod import;
pub mod metadata;
pub mod reader;
pub mod render;

// Re-export commonly used types
pub use import::{is_declared_pdf, ImportEntry, ImportOptions, ImportOutcome, ImportReport, Importer};
pub use metadata::{title_from_file_name, MetadataExtractor, PdfMetadata, DEFAULT_COVER_SCALE};
pub use reader::{Notice, ProgressSink, ReaderController, ReaderSettings, ReaderState};
pub use render::{render_page, Surface};
