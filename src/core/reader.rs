//! Reading session controller.
//!
//! A [`ReaderController`] owns at most one open document. Every render is
//! tagged with a generation number; a result is only published if no newer
//! request was issued while it was in flight, so the latest request always
//! wins and late results never overwrite newer pixels or report progress.
//!
//! The session lock is a plain mutex that is never held across an await.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::adapters::{DocumentHandle, PageHandle, PdfEngine};
use crate::core::render::{render_page, Surface};
use crate::domain::{clamp_page, Book, BookId, ThemeMode};
use crate::error::{ShelfError, ShelfResult};

/// Receives reading progress from a session
pub trait ProgressSink: Send + Sync {
    /// The reader moved to `page`
    fn report_progress(&self, id: &BookId, page: u32) -> ShelfResult<()>;

    /// The bookmark flag was set to `bookmarked`
    fn report_bookmark(&self, id: &BookId, bookmarked: bool) -> ShelfResult<()>;

    /// The document turned out to have `total_pages` pages
    fn report_page_count(&self, id: &BookId, total_pages: u32) -> ShelfResult<()>;
}

/// Lifecycle of a reading session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReaderState {
    #[default]
    Idle,
    Loading,
    Ready,
    Error {
        message: String,
    },
}

impl std::fmt::Display for ReaderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReaderState::Idle => write!(f, "idle"),
            ReaderState::Loading => write!(f, "loading"),
            ReaderState::Ready => write!(f, "ready"),
            ReaderState::Error { message } => write!(f, "error: {}", message),
        }
    }
}

/// Transient, non-fatal message for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl From<&ShelfError> for Notice {
    fn from(err: &ShelfError) -> Self {
        Self {
            message: err.to_string(),
            raised_at: Utc::now(),
        }
    }
}

/// Zoom bounds and display defaults
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderSettings {
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub zoom_step: f32,
    pub initial_zoom: f32,
    pub theme: ThemeMode,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            min_zoom: 0.5,
            max_zoom: 3.0,
            zoom_step: 0.1,
            initial_zoom: 1.0,
            theme: ThemeMode::Light,
        }
    }
}

impl ReaderSettings {
    /// Clamp `factor` into the zoom range, rounded to hundredths
    pub fn clamp_zoom(&self, factor: f32) -> f32 {
        let clamped = factor.clamp(self.min_zoom, self.max_zoom);
        (clamped * 100.0).round() / 100.0
    }
}

#[derive(Default)]
struct Session {
    state: ReaderState,
    /// Book being read, including its file bytes for retry
    book: Option<Book>,
    document: Option<DocumentHandle>,
    total_pages: u32,
    /// Page currently on the surface (or the initial page while loading)
    current_page: u32,
    /// Page of the most recent request
    target_page: u32,
    /// Page last known to the progress sink
    reported_page: u32,
    zoom: f32,
    theme: ThemeMode,
    bookmarked: bool,
    generation: u64,
    surface: Surface,
    notices: Vec<Notice>,
}

impl Session {
    /// Supersede any in-flight work and start a render of `page`
    fn begin(&mut self, page: PageHandle) -> RenderRequest {
        self.generation += 1;
        self.state = ReaderState::Loading;
        self.target_page = page.number();
        RenderRequest {
            generation: self.generation,
            page,
            zoom: self.zoom,
            theme: self.theme,
        }
    }

    fn notify(&mut self, err: &ShelfError) {
        warn!("{}", err);
        self.notices.push(Notice::from(err));
    }
}

struct RenderRequest {
    generation: u64,
    page: PageHandle,
    zoom: f32,
    theme: ThemeMode,
}

/// Drives a single reading session
pub struct ReaderController {
    engine: Arc<dyn PdfEngine>,
    sink: Arc<dyn ProgressSink>,
    settings: ReaderSettings,
    session: Mutex<Session>,
}

impl ReaderController {
    pub fn new(engine: Arc<dyn PdfEngine>, sink: Arc<dyn ProgressSink>) -> Self {
        Self::with_settings(engine, sink, ReaderSettings::default())
    }

    pub fn with_settings(
        engine: Arc<dyn PdfEngine>,
        sink: Arc<dyn ProgressSink>,
        settings: ReaderSettings,
    ) -> Self {
        let session = Session {
            zoom: if settings.initial_zoom.is_finite() {
                settings.clamp_zoom(settings.initial_zoom)
            } else {
                settings.clamp_zoom(1.0)
            },
            theme: settings.theme,
            ..Default::default()
        };
        Self {
            engine,
            sink,
            settings,
            session: Mutex::new(session),
        }
    }

    pub fn settings(&self) -> &ReaderSettings {
        &self.settings
    }

    /// Open `book` and render its stored page
    ///
    /// Any previously open document is released first. Opening never reports
    /// progress; it only corrects the stored page count when it differs.
    #[instrument(skip(self, book), fields(id = %book.id))]
    pub async fn open(&self, book: &Book) -> ShelfResult<()> {
        let generation = {
            let mut session = self.lock();
            if let Some(previous) = session.document.take() {
                previous.release();
            }
            session.generation += 1;
            session.state = ReaderState::Loading;
            session.book = Some(book.clone());
            session.bookmarked = book.is_bookmarked;
            session.total_pages = 0;
            session.current_page = 0;
            session.target_page = 0;
            session.surface = Surface::new();
            session.generation
        };

        let Some(file) = book.file.as_ref() else {
            let err = ShelfError::MissingFileData {
                title: book.title.clone(),
            };
            self.fail_open(generation, &err);
            return Err(err);
        };

        let document = match self.engine.open(file.private_copy()).await {
            Ok(document) => document,
            Err(e) => {
                let err = ShelfError::DocumentOpenFailure(e.to_string());
                self.fail_open(generation, &err);
                return Err(err);
            }
        };

        let total_pages = document.page_count();
        if total_pages == 0 {
            let err = ShelfError::DocumentOpenFailure("document has no pages".to_string());
            self.fail_open(generation, &err);
            return Err(err);
        }

        let initial = clamp_page(book.current_page, total_pages);
        let page = match document.page(initial) {
            Ok(page) => page,
            Err(e) => {
                let err = ShelfError::DocumentOpenFailure(e.to_string());
                self.fail_open(generation, &err);
                return Err(err);
            }
        };

        let request = {
            let mut session = self.lock();
            if session.generation != generation {
                debug!("Discarding superseded open");
                return Ok(());
            }
            session.document = Some(document);
            session.total_pages = total_pages;
            session.current_page = initial;
            session.reported_page = book.current_page;
            session.begin(page)
        };

        if book.total_pages != total_pages {
            if let Err(e) = self.sink.report_page_count(&book.id, total_pages) {
                self.lock().notify(&e);
            }
        }

        info!(total_pages, page = initial, "Opened book");
        self.render(request).await;
        Ok(())
    }

    /// Reopen the current book after an error
    pub async fn retry(&self) -> ShelfResult<()> {
        let book = self.lock().book.clone().ok_or(ShelfError::NoActiveBook)?;
        self.open(&book).await
    }

    /// Release the document and return to idle
    pub fn close(&self) {
        let mut session = self.lock();
        session.generation += 1;
        if let Some(document) = session.document.take() {
            document.release();
            debug!("Closed document");
        }
        session.state = ReaderState::Idle;
        session.book = None;
        session.total_pages = 0;
        session.current_page = 0;
        session.target_page = 0;
        session.surface = Surface::new();
    }

    /// Navigate to `page`; pages outside the document are ignored
    pub async fn go_to_page(&self, page: u32) -> ShelfResult<()> {
        let request = {
            let mut session = self.lock();
            let Some(document) = session.document.as_ref() else {
                return Err(ShelfError::NoActiveBook);
            };
            if page < 1 || page > session.total_pages {
                debug!(page, total_pages = session.total_pages, "Ignoring out-of-range page");
                return Ok(());
            }
            let handle = match document.page(page) {
                Ok(handle) => handle,
                Err(e) => {
                    let err = ShelfError::PageRenderFailure {
                        page,
                        reason: e.to_string(),
                    };
                    session.notify(&err);
                    return Ok(());
                }
            };
            session.begin(handle)
        };

        self.render(request).await;
        Ok(())
    }

    pub async fn next_page(&self) -> ShelfResult<()> {
        let target = self.lock().target_page.saturating_add(1);
        self.go_to_page(target).await
    }

    pub async fn previous_page(&self) -> ShelfResult<()> {
        let target = self.lock().target_page.saturating_sub(1);
        self.go_to_page(target).await
    }

    /// Set the zoom factor (clamped) and re-render; returns the applied zoom
    pub async fn set_zoom(&self, factor: f32) -> f32 {
        let zoom = {
            let mut session = self.lock();
            if factor.is_finite() {
                session.zoom = self.settings.clamp_zoom(factor);
            }
            session.zoom
        };
        self.rerender().await;
        zoom
    }

    pub async fn zoom_in(&self) -> f32 {
        let zoom = self.zoom();
        self.set_zoom(zoom + self.settings.zoom_step).await
    }

    pub async fn zoom_out(&self) -> f32 {
        let zoom = self.zoom();
        self.set_zoom(zoom - self.settings.zoom_step).await
    }

    /// Switch the color theme and re-render
    pub async fn set_theme(&self, theme: ThemeMode) {
        self.lock().theme = theme;
        self.rerender().await;
    }

    /// Flip the bookmark flag; returns the new value
    pub fn toggle_bookmark(&self) -> ShelfResult<bool> {
        let mut session = self.lock();
        let id = session
            .book
            .as_ref()
            .map(|b| b.id.clone())
            .ok_or(ShelfError::NoActiveBook)?;

        let bookmarked = !session.bookmarked;
        session.bookmarked = bookmarked;
        if let Some(book) = session.book.as_mut() {
            book.is_bookmarked = bookmarked;
        }
        if let Err(e) = self.sink.report_bookmark(&id, bookmarked) {
            session.notify(&e);
        }
        Ok(bookmarked)
    }

    pub fn state(&self) -> ReaderState {
        self.lock().state.clone()
    }

    pub fn current_page(&self) -> u32 {
        self.lock().current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.lock().total_pages
    }

    pub fn zoom(&self) -> f32 {
        self.lock().zoom
    }

    pub fn theme(&self) -> ThemeMode {
        self.lock().theme
    }

    pub fn is_bookmarked(&self) -> bool {
        self.lock().bookmarked
    }

    /// Book of the current session
    pub fn book(&self) -> Option<Book> {
        self.lock().book.clone()
    }

    /// Snapshot of the last published page image
    pub fn surface(&self) -> Surface {
        self.lock().surface.clone()
    }

    /// Drain pending notices
    pub fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut self.lock().notices)
    }

    async fn rerender(&self) {
        let request = {
            let mut session = self.lock();
            let Some(document) = session.document.as_ref() else {
                return;
            };
            let page = session.target_page;
            match document.page(page) {
                Ok(handle) => session.begin(handle),
                Err(e) => {
                    let err = ShelfError::PageRenderFailure {
                        page,
                        reason: e.to_string(),
                    };
                    session.notify(&err);
                    return;
                }
            }
        };
        self.render(request).await;
    }

    /// Render into a scratch surface and publish if still current
    async fn render(&self, request: RenderRequest) {
        let number = request.page.number();
        let mut scratch = Surface::new();
        let result = render_page(&request.page, &mut scratch, request.zoom, request.theme).await;

        let mut session = self.lock();
        if session.generation != request.generation {
            debug!(page = number, "Discarding superseded render");
            return;
        }
        session.state = ReaderState::Ready;

        match result {
            Ok(()) => {
                session.surface = scratch;
                session.current_page = number;
                if number != session.reported_page {
                    session.reported_page = number;
                    let id = session.book.as_mut().map(|book| {
                        book.current_page = number;
                        book.id.clone()
                    });
                    if let Some(id) = id {
                        if let Err(e) = self.sink.report_progress(&id, number) {
                            session.notify(&e);
                        }
                    }
                }
            }
            Err(e) => {
                // Later requests start from the page still on screen
                session.target_page = session.current_page;
                let err = ShelfError::PageRenderFailure {
                    page: number,
                    reason: e.to_string(),
                };
                session.notify(&err);
            }
        }
    }

    fn fail_open(&self, generation: u64, err: &ShelfError) {
        let mut session = self.lock();
        if session.generation != generation {
            return;
        }
        warn!("{}", err);
        session.state = ReaderState::Error {
            message: err.to_string(),
        };
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
