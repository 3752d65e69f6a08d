//! Shared test doubles: a scripted rendering engine and a recording sink.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pdfshelf::adapters::{
    DocumentHandle, DocumentInfo, EngineError, PdfDocument, PdfEngine, Viewport,
};
use pdfshelf::core::{ProgressSink, Surface};
use pdfshelf::{Book, BookId, ShelfResult};

/// Page size of every fake page, in points
pub const PAGE_WIDTH: f32 = 100.0;
pub const PAGE_HEIGHT: f32 = 200.0;

/// Bytes the fake engine accepts as a document
pub fn pdf_bytes() -> Vec<u8> {
    b"%PDF-1.7 fake document".to_vec()
}

/// A book whose bytes open in the fake engine
pub fn readable_book(id: &str, total_pages: u32) -> Book {
    Book::new(BookId::new(id), format!("Book {}", id), format!("{}.pdf", id))
        .with_file(pdf_bytes())
        .with_total_pages(total_pages)
}

#[derive(Default)]
struct Script {
    delays: HashMap<u32, Duration>,
    failing: HashSet<u32>,
}

/// In-memory engine with scripted page delays and failures
///
/// Documents open when the bytes start with `%PDF`. Rendering fills the
/// surface with `[page, 0, 0, 255]` so tests can tell pages apart.
pub struct FakeEngine {
    pages: u32,
    info: DocumentInfo,
    script: Arc<Mutex<Script>>,
    pub opens: AtomicUsize,
    pub releases: Arc<AtomicUsize>,
    opened_buffers: Mutex<Vec<usize>>,
}

impl FakeEngine {
    pub fn new(pages: u32) -> Self {
        Self {
            pages,
            info: DocumentInfo::default(),
            script: Arc::new(Mutex::new(Script::default())),
            opens: AtomicUsize::new(0),
            releases: Arc::new(AtomicUsize::new(0)),
            opened_buffers: Mutex::new(Vec::new()),
        }
    }

    pub fn with_info(mut self, title: Option<&str>, author: Option<&str>) -> Self {
        self.info = DocumentInfo {
            title: title.map(str::to_string),
            author: author.map(str::to_string),
            language: None,
        };
        self
    }

    /// Delay rendering of `page`
    pub fn set_delay(&self, page: u32, delay: Duration) {
        self.script.lock().unwrap().delays.insert(page, delay);
    }

    /// Make rendering of `page` fail
    pub fn fail_page(&self, page: u32) {
        self.script.lock().unwrap().failing.insert(page);
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Addresses of every buffer handed to `open`
    pub fn opened_buffers(&self) -> Vec<usize> {
        self.opened_buffers.lock().unwrap().clone()
    }
}

#[async_trait]
impl PdfEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    async fn open(&self, bytes: Vec<u8>) -> Result<DocumentHandle, EngineError> {
        self.opened_buffers
            .lock()
            .unwrap()
            .push(bytes.as_ptr() as usize);

        if !bytes.starts_with(b"%PDF") {
            return Err(EngineError::Open("Invalid PDF structure".to_string()));
        }

        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(DocumentHandle::new(Arc::new(FakeDocument {
            pages: self.pages,
            info: self.info.clone(),
            script: Arc::clone(&self.script),
            released: AtomicBool::new(false),
            releases: Arc::clone(&self.releases),
        })))
    }
}

struct FakeDocument {
    pages: u32,
    info: DocumentInfo,
    script: Arc<Mutex<Script>>,
    released: AtomicBool,
    releases: Arc<AtomicUsize>,
}

#[async_trait]
impl PdfDocument for FakeDocument {
    fn page_count(&self) -> u32 {
        self.pages
    }

    fn info(&self) -> DocumentInfo {
        self.info.clone()
    }

    fn page_size(&self, page: u32) -> Result<(f32, f32), EngineError> {
        if page == 0 || page > self.pages {
            return Err(EngineError::NoSuchPage {
                page,
                page_count: self.pages,
            });
        }
        Ok((PAGE_WIDTH, PAGE_HEIGHT))
    }

    async fn render_page(
        &self,
        page: u32,
        surface: &mut Surface,
        _viewport: Viewport,
    ) -> Result<(), EngineError> {
        let (delay, fails) = {
            let script = self.script.lock().unwrap();
            (script.delays.get(&page).copied(), script.failing.contains(&page))
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.released.load(Ordering::SeqCst) {
            return Err(EngineError::Released);
        }
        if fails {
            return Err(EngineError::Render(format!("page {} is damaged", page)));
        }

        for px in surface.pixels_mut().chunks_exact_mut(4) {
            px.copy_from_slice(&[page as u8, 0, 0, 255]);
        }
        Ok(())
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// What a reader told its sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Progress(u32),
    Bookmark(bool),
    PageCount(u32),
}

/// Sink that records every report
#[derive(Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<Report>>,
}

impl RecordingSink {
    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<u32> {
        self.reports()
            .into_iter()
            .filter_map(|r| match r {
                Report::Progress(page) => Some(page),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn report_progress(&self, _id: &BookId, page: u32) -> ShelfResult<()> {
        self.reports.lock().unwrap().push(Report::Progress(page));
        Ok(())
    }

    fn report_bookmark(&self, _id: &BookId, bookmarked: bool) -> ShelfResult<()> {
        self.reports.lock().unwrap().push(Report::Bookmark(bookmarked));
        Ok(())
    }

    fn report_page_count(&self, _id: &BookId, total_pages: u32) -> ShelfResult<()> {
        self.reports.lock().unwrap().push(Report::PageCount(total_pages));
        Ok(())
    }
}
