//! Adapter interfaces for PDF rendering engines.
//!
//! The engine is an opaque capability: open bytes into a document, look up
//! pages, size a viewport and draw into a [`Surface`]. The library only ever
//! talks to it through [`PdfEngine`] and [`DocumentHandle`].

pub mod pdfium;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::render::Surface;

// Re-export the Pdfium adapter
pub use pdfium::PdfiumEngine;

/// Errors reported by a rendering engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine library could not be loaded
    #[error("rendering engine unavailable: {0}")]
    Unavailable(String),

    /// The bytes are not a readable document
    #[error("{0}")]
    Open(String),

    #[error("page {page} does not exist (document has {page_count} pages)")]
    NoSuchPage { page: u32, page_count: u32 },

    #[error("{0}")]
    Render(String),

    /// The document handle was released while work was still pending
    #[error("document has been released")]
    Released,
}

/// Document-level metadata as reported by the engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
}

/// Pixel dimensions of a page at a given scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub scale: f32,
}

impl Viewport {
    /// Viewport for a page of `width` x `height` points
    pub fn for_page(width: f32, height: f32, scale: f32) -> Self {
        Self {
            width: (width * scale).round().max(1.0) as u32,
            height: (height * scale).round().max(1.0) as u32,
            scale,
        }
    }
}

/// Entry point of a rendering engine
#[async_trait]
pub trait PdfEngine: Send + Sync {
    /// Human-readable engine name
    fn name(&self) -> &str;

    /// Open a document; fails on malformed input
    async fn open(&self, bytes: Vec<u8>) -> Result<DocumentHandle, EngineError>;
}

/// An open document inside an engine
///
/// Pages are 1-based.
#[async_trait]
pub trait PdfDocument: Send + Sync {
    fn page_count(&self) -> u32;

    fn info(&self) -> DocumentInfo;

    /// Page size in points at scale 1.0
    fn page_size(&self, page: u32) -> Result<(f32, f32), EngineError>;

    /// Draw `page` into `surface`, which is already sized to `viewport`
    async fn render_page(
        &self,
        page: u32,
        surface: &mut Surface,
        viewport: Viewport,
    ) -> Result<(), EngineError>;

    /// Free decoder resources; later calls fail with [`EngineError::Released`]
    fn release(&self);
}

/// Owned handle to an open document
///
/// Releases the document when dropped, so every exit path frees it.
pub struct DocumentHandle {
    inner: Arc<dyn PdfDocument>,
}

impl DocumentHandle {
    pub fn new(inner: Arc<dyn PdfDocument>) -> Self {
        Self { inner }
    }

    pub fn page_count(&self) -> u32 {
        self.inner.page_count()
    }

    pub fn info(&self) -> DocumentInfo {
        self.inner.info()
    }

    /// Look up a 1-based page
    pub fn page(&self, number: u32) -> Result<PageHandle, EngineError> {
        let page_count = self.inner.page_count();
        if number == 0 || number > page_count {
            return Err(EngineError::NoSuchPage {
                page: number,
                page_count,
            });
        }

        let (width, height) = self.inner.page_size(number)?;
        Ok(PageHandle {
            document: Arc::clone(&self.inner),
            number,
            width,
            height,
        })
    }

    /// Release the document now
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for DocumentHandle {
    fn drop(&mut self) {
        self.inner.release();
    }
}

impl std::fmt::Debug for DocumentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentHandle")
            .field("page_count", &self.inner.page_count())
            .finish()
    }
}

/// A page of an open document
///
/// Outliving the document is allowed; rendering then fails with
/// [`EngineError::Released`].
#[derive(Clone)]
pub struct PageHandle {
    document: Arc<dyn PdfDocument>,
    number: u32,
    width: f32,
    height: f32,
}

impl PageHandle {
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Pixel size of this page at `scale`
    pub fn viewport(&self, scale: f32) -> Viewport {
        Viewport::for_page(self.width, self.height, scale)
    }

    /// Draw the page into a surface sized to `viewport`
    pub async fn render(&self, surface: &mut Surface, viewport: Viewport) -> Result<(), EngineError> {
        self.document
            .render_page(self.number, surface, viewport)
            .await
    }
}
