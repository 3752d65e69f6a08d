//! Pdfium rendering engine.
//!
//! The Pdfium shared library is bound at runtime, not at build time. Pdfium
//! documents borrow the library instance and cannot cross threads, so all
//! work runs on the blocking pool and each render reopens the document from
//! the bytes retained by the handle.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pdfium_render::prelude::*;
use tracing::debug;

use super::{DocumentHandle, DocumentInfo, EngineError, PdfDocument, PdfEngine, Viewport};
use crate::core::render::Surface;

thread_local! {
    static PDFIUM: RefCell<Option<Pdfium>> = RefCell::new(None);
}

/// Pdfium-backed engine
#[derive(Debug, Clone, Default)]
pub struct PdfiumEngine {
    /// Explicit path to the Pdfium library file
    library_path: Option<PathBuf>,
}

impl PdfiumEngine {
    /// Engine that looks for Pdfium next to the executable, then system-wide
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine bound to a specific Pdfium library file
    pub fn with_library_path(library_path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(library_path.into()),
        }
    }

    /// Check that the Pdfium library can be loaded
    pub async fn health_check(&self) -> Result<(), EngineError> {
        let library_path = self.library_path.clone();
        run_blocking(move || with_pdfium(library_path.as_deref(), |_| Ok(()))).await
    }
}

#[async_trait]
impl PdfEngine for PdfiumEngine {
    fn name(&self) -> &str {
        "pdfium"
    }

    async fn open(&self, bytes: Vec<u8>) -> Result<DocumentHandle, EngineError> {
        let bytes: Arc<[u8]> = Arc::from(bytes);
        let library_path = self.library_path.clone();

        let probe = Arc::clone(&bytes);
        let probe_library = library_path.clone();
        let (info, page_sizes) = run_blocking(move || {
            with_pdfium(probe_library.as_deref(), |pdfium| {
                let document = pdfium
                    .load_pdf_from_byte_slice(&probe, None)
                    .map_err(|e| EngineError::Open(e.to_string()))?;

                let page_sizes: Vec<(f32, f32)> = document
                    .pages()
                    .iter()
                    .map(|page| (page.width().value, page.height().value))
                    .collect();

                let metadata = document.metadata();
                let tag = |tag: PdfDocumentMetadataTagType| -> Option<String> {
                    metadata
                        .get(tag)
                        .map(|t| t.value().trim().to_string())
                        .filter(|v: &String| !v.is_empty())
                };
                let info = DocumentInfo {
                    title: tag(PdfDocumentMetadataTagType::Title),
                    author: tag(PdfDocumentMetadataTagType::Author),
                    // Pdfium does not surface the catalog /Lang entry
                    language: None,
                };

                Ok((info, page_sizes))
            })
        })
        .await?;

        debug!(pages = page_sizes.len(), "Opened document with pdfium");

        Ok(DocumentHandle::new(Arc::new(PdfiumDocument {
            bytes: Mutex::new(Some(bytes)),
            library_path,
            info,
            page_sizes,
        })))
    }
}

/// Document opened by [`PdfiumEngine`]
struct PdfiumDocument {
    /// `None` once released
    bytes: Mutex<Option<Arc<[u8]>>>,
    library_path: Option<PathBuf>,
    info: DocumentInfo,
    page_sizes: Vec<(f32, f32)>,
}

impl PdfiumDocument {
    fn retained_bytes(&self) -> Result<Arc<[u8]>, EngineError> {
        self.bytes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or(EngineError::Released)
    }
}

#[async_trait]
impl PdfDocument for PdfiumDocument {
    fn page_count(&self) -> u32 {
        self.page_sizes.len() as u32
    }

    fn info(&self) -> DocumentInfo {
        self.info.clone()
    }

    fn page_size(&self, page: u32) -> Result<(f32, f32), EngineError> {
        page.checked_sub(1)
            .and_then(|idx| self.page_sizes.get(idx as usize))
            .copied()
            .ok_or(EngineError::NoSuchPage {
                page,
                page_count: self.page_count(),
            })
    }

    async fn render_page(
        &self,
        page: u32,
        surface: &mut Surface,
        viewport: Viewport,
    ) -> Result<(), EngineError> {
        let bytes = self.retained_bytes()?;
        let library_path = self.library_path.clone();
        let page_index = u16::try_from(page.saturating_sub(1)).map_err(|_| {
            EngineError::NoSuchPage {
                page,
                page_count: self.page_count(),
            }
        })?;

        let (width, height, pixels) = run_blocking(move || {
            with_pdfium(library_path.as_deref(), |pdfium| {
                let document = pdfium
                    .load_pdf_from_byte_slice(&bytes, None)
                    .map_err(|e| EngineError::Open(e.to_string()))?;
                let pdf_page = document
                    .pages()
                    .get(page_index)
                    .map_err(|e| EngineError::Render(e.to_string()))?;

                let render_config = PdfRenderConfig::new()
                    .set_target_width(viewport.width.max(1) as i32)
                    .set_maximum_height(viewport.height.max(1) as i32)
                    .render_form_data(true)
                    .render_annotations(true)
                    .set_reverse_byte_order(false)
                    .set_format(PdfBitmapFormat::BGRA);

                let bitmap = pdf_page
                    .render_with_config(&render_config)
                    .map_err(|e| EngineError::Render(e.to_string()))?;

                Ok(bgra_to_rgba(
                    bitmap.width().max(0) as usize,
                    bitmap.height().max(0) as usize,
                    &bitmap.as_raw_bytes(),
                ))
            })
        })
        .await?;

        surface.put_rgba(width as u32, height as u32, pixels)
    }

    fn release(&self) {
        let released = self
            .bytes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if released.is_some() {
            debug!("Released pdfium document");
        }
    }
}

/// Repack a BGRA bitmap with arbitrary stride into tight RGBA rows
fn bgra_to_rgba(width: usize, height: usize, src: &[u8]) -> (usize, usize, Vec<u8>) {
    let stride = if height == 0 { 0 } else { src.len() / height };

    let mut pixels = Vec::with_capacity(width.saturating_mul(height).saturating_mul(4));
    for y in 0..height {
        let base = y.saturating_mul(stride);
        for x in 0..width {
            let idx = base.saturating_add(x.saturating_mul(4));
            let b = src.get(idx).copied().unwrap_or(255);
            let g = src.get(idx + 1).copied().unwrap_or(255);
            let r = src.get(idx + 2).copied().unwrap_or(255);
            let a = src.get(idx + 3).copied().unwrap_or(255);
            pixels.extend_from_slice(&[r, g, b, a]);
        }
    }

    (width, height, pixels)
}

async fn run_blocking<T, F>(f: F) -> Result<T, EngineError>
where
    F: FnOnce() -> Result<T, EngineError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| EngineError::Render(format!("pdfium worker failed: {}", e)))?
}

/// Run `f` with this thread's Pdfium instance, binding it on first use
fn with_pdfium<T>(
    library_path: Option<&Path>,
    f: impl FnOnce(&Pdfium) -> Result<T, EngineError>,
) -> Result<T, EngineError> {
    PDFIUM.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            *slot = Some(bind_pdfium(library_path)?);
        }
        match slot.as_ref() {
            Some(pdfium) => f(pdfium),
            None => Err(EngineError::Unavailable("pdfium not initialized".to_string())),
        }
    })
}

fn bind_pdfium(library_path: Option<&Path>) -> Result<Pdfium, EngineError> {
    if let Some(path) = library_path {
        let bindings = Pdfium::bind_to_library(path).map_err(|e| {
            EngineError::Unavailable(format!(
                "failed to load Pdfium from {}: {}",
                path.display(),
                e
            ))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    let mut candidates = Vec::new();
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(Pdfium::pdfium_platform_library_name_at_path(&dir));
    }
    candidates.push(Pdfium::pdfium_platform_library_name_at_path(Path::new(".")));

    for path in candidates {
        if let Ok(bindings) = Pdfium::bind_to_library(&path) {
            debug!(path = %path.display(), "Bound pdfium library");
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        EngineError::Unavailable(format!(
            "{} (install Pdfium system-wide, place {} next to the executable, or set PDFSHELF_PDFIUM_LIB)",
            e,
            Pdfium::pdfium_platform_library_name().to_string_lossy()
        ))
    })?;

    Ok(Pdfium::new(bindings))
}
