//! Domain types for the library.
//!
//! - Book: a PDF in the library with its reading progress
//! - BookPatch: partial updates applied by id
//! - ThemeMode: color treatment for rendered pages

pub mod book;
pub mod theme;

// Re-export commonly used types
pub use book::{
    clamp_page, Book, BookId, BookPatch, FileData, PLACEHOLDER_COVER, UNKNOWN_AUTHOR,
    UNKNOWN_LANGUAGE,
};
pub use theme::ThemeMode;
