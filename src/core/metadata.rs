//! Best-effort metadata extraction.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::adapters::{DocumentHandle, PdfEngine};
use crate::core::render::{render_page, Surface};
use crate::domain::{Book, BookId, ThemeMode};
use crate::error::{ShelfError, ShelfResult};

/// Scale used for cover thumbnails
pub const DEFAULT_COVER_SCALE: f32 = 0.5;

/// Metadata read from a PDF; every field may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdfMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
    pub total_pages: Option<u32>,
    /// PNG data URL of the first page
    pub cover_url: Option<String>,
}

impl PdfMetadata {
    /// Build a library record, filling gaps with library defaults
    pub fn into_book(self, id: BookId, file_name: &str, bytes: Vec<u8>) -> Book {
        let title = self
            .title
            .unwrap_or_else(|| title_from_file_name(file_name));

        let mut book = Book::new(id, title, file_name)
            .with_file(bytes)
            .with_total_pages(self.total_pages.unwrap_or(0));

        if let Some(author) = self.author {
            book = book.with_author(author);
        }
        if let Some(language) = self.language {
            book.language = language;
        }
        if let Some(cover_url) = self.cover_url {
            book.cover_url = cover_url;
        }
        book
    }
}

/// File name with a trailing `.pdf` removed
pub fn title_from_file_name(file_name: &str) -> String {
    let stem = match file_name.len().checked_sub(4) {
        Some(cut)
            if file_name.is_char_boundary(cut)
                && file_name[cut..].eq_ignore_ascii_case(".pdf") =>
        {
            &file_name[..cut]
        }
        _ => file_name,
    };

    if stem.trim().is_empty() {
        file_name.to_string()
    } else {
        stem.to_string()
    }
}

/// Reads title, author, language, page count and a cover image
pub struct MetadataExtractor {
    engine: Arc<dyn PdfEngine>,
    cover_scale: f32,
}

impl MetadataExtractor {
    pub fn new(engine: Arc<dyn PdfEngine>) -> Self {
        Self {
            engine,
            cover_scale: DEFAULT_COVER_SCALE,
        }
    }

    pub fn with_cover_scale(mut self, scale: f32) -> Self {
        self.cover_scale = scale;
        self
    }

    /// Extract what can be read; never fails
    pub async fn extract(&self, bytes: Vec<u8>) -> PdfMetadata {
        match self.try_extract(bytes).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("{}", e);
                PdfMetadata::default()
            }
        }
    }

    async fn try_extract(&self, bytes: Vec<u8>) -> ShelfResult<PdfMetadata> {
        let document = self
            .engine
            .open(bytes)
            .await
            .map_err(|e| ShelfError::MetadataExtractionFailure(e.to_string()))?;

        let info = document.info();
        let total_pages = document.page_count();
        let cover_url = self.render_cover(&document).await;
        document.release();

        debug!(total_pages, has_cover = cover_url.is_some(), "Extracted metadata");

        Ok(PdfMetadata {
            title: non_empty(info.title),
            author: non_empty(info.author),
            language: non_empty(info.language),
            total_pages: Some(total_pages).filter(|&n| n > 0),
            cover_url,
        })
    }

    async fn render_cover(&self, document: &DocumentHandle) -> Option<String> {
        let page = document.page(1).ok()?;
        let mut surface = Surface::new();

        if let Err(e) = render_page(&page, &mut surface, self.cover_scale, ThemeMode::Light).await {
            warn!("Cover render failed: {}", e);
            return None;
        }

        match surface.to_data_url() {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("Cover encode failed: {:#}", e);
                None
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PLACEHOLDER_COVER, UNKNOWN_AUTHOR, UNKNOWN_LANGUAGE};

    #[test]
    fn test_title_from_file_name() {
        assert_eq!(title_from_file_name("report.pdf"), "report");
        assert_eq!(title_from_file_name("Annual Report.PDF"), "Annual Report");
        assert_eq!(title_from_file_name("notes.pdf.bak"), "notes.pdf.bak");
        assert_eq!(title_from_file_name(".pdf"), ".pdf");
        assert_eq!(title_from_file_name("é.pdf"), "é");
    }

    #[test]
    fn test_into_book_defaults() {
        let book = PdfMetadata::default().into_book(BookId::new("1"), "report.pdf", vec![1, 2, 3]);

        assert_eq!(book.title, "report");
        assert_eq!(book.author, UNKNOWN_AUTHOR);
        assert_eq!(book.language, UNKNOWN_LANGUAGE);
        assert_eq!(book.cover_url, PLACEHOLDER_COVER);
        assert_eq!(book.total_pages, 0);
        assert_eq!(book.current_page, 1);
        assert_eq!(book.file_size_bytes, 3);
        assert!(book.has_file());
    }

    #[test]
    fn test_into_book_prefers_document_fields() {
        let metadata = PdfMetadata {
            title: Some("Dune".into()),
            author: Some("Frank Herbert".into()),
            language: Some("en".into()),
            total_pages: Some(412),
            cover_url: Some("data:image/png;base64,AAAA".into()),
        };
        let book = metadata.into_book(BookId::new("1"), "dune.pdf", vec![]);

        assert_eq!(book.title, "Dune");
        assert_eq!(book.author, "Frank Herbert");
        assert_eq!(book.language, "en");
        assert_eq!(book.total_pages, 412);
        assert!(book.cover_url.starts_with("data:image/png"));
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  ".into())), None);
        assert_eq!(non_empty(Some(" Dune ".into())), Some("Dune".into()));
        assert_eq!(non_empty(None), None);
    }
}
