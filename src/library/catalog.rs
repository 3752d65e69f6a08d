//! Catalog of all books in the library.
//!
//! The catalog is the only writer of the book list. Every mutation builds
//! the next list, writes it through the [`LibraryStore`] and then swaps it
//! in, so readers never see a half-applied change. Storage failures are
//! logged here and go no further.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{info, warn};

use crate::core::reader::ProgressSink;
use crate::domain::{Book, BookId, BookPatch};
use crate::error::{ShelfError, ShelfResult};

use super::store::{LibraryStore, SaveOutcome};

/// Number of books shown in the "recently read" list by default
pub const DEFAULT_RECENT_LIMIT: usize = 5;

/// Ordering for catalog listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    Title,
    Author,
    /// Most recently opened first
    LastOpened,
    /// Most recently added first
    #[default]
    AddedDate,
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortKey::Title => write!(f, "title"),
            SortKey::Author => write!(f, "author"),
            SortKey::LastOpened => write!(f, "last-opened"),
            SortKey::AddedDate => write!(f, "added"),
        }
    }
}

impl std::str::FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "title" => Ok(SortKey::Title),
            "author" => Ok(SortKey::Author),
            "last-opened" | "lastopened" | "recent" => Ok(SortKey::LastOpened),
            "added" | "added-date" | "addeddate" => Ok(SortKey::AddedDate),
            _ => anyhow::bail!("Unknown sort key: {}", s),
        }
    }
}

/// In-memory projection of the stored library
pub struct Catalog {
    store: LibraryStore,
    books: Vec<Book>,
}

impl Catalog {
    /// Load the catalog from its store
    pub fn open(store: LibraryStore) -> Self {
        let books = store.load();
        info!(books = books.len(), "Catalog loaded");
        Self { store, books }
    }

    pub fn store(&self) -> &LibraryStore {
        &self.store
    }

    /// All books in insertion order
    pub fn books(&self) -> &[Book] {
        &self.books
    }

    /// Get a book by ID
    pub fn get(&self, id: &BookId) -> Option<&Book> {
        self.books.iter().find(|b| &b.id == id)
    }

    /// Get the number of books
    pub fn len(&self) -> usize {
        self.books.len()
    }

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Re-read the list from the store
    pub fn refresh(&mut self) {
        self.books = self.store.load();
    }

    /// Add a new book
    pub fn add(&mut self, book: Book) -> ShelfResult<()> {
        if self.get(&book.id).is_some() {
            return Err(ShelfError::DuplicateBook(book.id));
        }

        info!(id = %book.id, title = %book.title, "Adding book");
        let mut next = self.books.clone();
        next.push(book);
        self.commit(next);
        Ok(())
    }

    /// Record that `id` is now at `page`
    pub fn update_progress(&mut self, id: &BookId, page: u32) -> ShelfResult<Book> {
        let book = self.require(id)?;
        if !book.is_valid_page(page) {
            return Err(ShelfError::PageOutOfRange {
                page,
                total_pages: book.total_pages,
            });
        }

        self.mutate(id, |book| book.record_progress(page, Utc::now()))
    }

    /// Flip the bookmark flag, returning the new value
    pub fn toggle_bookmark(&mut self, id: &BookId) -> ShelfResult<bool> {
        let updated = self.mutate(id, |book| book.is_bookmarked = !book.is_bookmarked)?;
        Ok(updated.is_bookmarked)
    }

    /// Set the bookmark flag to an explicit value
    pub fn set_bookmark(&mut self, id: &BookId, bookmarked: bool) -> ShelfResult<()> {
        self.mutate(id, |book| book.is_bookmarked = bookmarked)?;
        Ok(())
    }

    /// Apply a manual edit
    pub fn update(&mut self, id: &BookId, patch: &BookPatch) -> ShelfResult<Book> {
        self.mutate(id, |book| book.apply(patch))
    }

    /// Remove a book by ID
    pub fn delete(&mut self, id: &BookId) -> ShelfResult<Book> {
        let pos = self
            .books
            .iter()
            .position(|b| &b.id == id)
            .ok_or_else(|| ShelfError::UnknownBook(id.clone()))?;

        let mut next = self.books.clone();
        let removed = next.remove(pos);
        info!(id = %removed.id, title = %removed.title, "Deleting book");
        self.commit(next);
        Ok(removed)
    }

    /// Remove every book
    pub fn clear(&mut self) {
        info!(books = self.books.len(), "Clearing library");
        self.commit(Vec::new());
    }

    /// Filter and sort the catalog
    ///
    /// A blank filter returns every book.
    pub fn list(&self, filter: Option<&str>, sort: SortKey) -> Vec<&Book> {
        let term = filter.map(str::trim).filter(|t| !t.is_empty());

        let mut items: Vec<&Book> = match term {
            Some(term) => {
                let term = term.to_lowercase();
                self.books
                    .iter()
                    .filter(|b| matches_filter(b, &term))
                    .collect()
            }
            None => self.books.iter().collect(),
        };

        sort_books(&mut items, sort);
        items
    }

    /// Multi-term search: every word must appear somewhere in the book
    ///
    /// A blank query returns nothing.
    pub fn search(&self, query: &str) -> Vec<&Book> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if terms.is_empty() {
            return Vec::new();
        }

        self.books
            .iter()
            .filter(|book| {
                let haystack = searchable_text(book);
                terms.iter().all(|t| haystack.contains(t.as_str()))
            })
            .collect()
    }

    /// Bookmarked books, newest first
    pub fn bookmarked(&self) -> Vec<&Book> {
        let mut items: Vec<&Book> = self.books.iter().filter(|b| b.is_bookmarked).collect();
        sort_books(&mut items, SortKey::AddedDate);
        items
    }

    /// The `limit` most recently opened books
    pub fn recent(&self, limit: usize) -> Vec<&Book> {
        let mut items = self.list(None, SortKey::LastOpened);
        items.truncate(limit);
        items
    }

    fn require(&self, id: &BookId) -> ShelfResult<&Book> {
        self.get(id).ok_or_else(|| ShelfError::UnknownBook(id.clone()))
    }

    fn mutate<F>(&mut self, id: &BookId, f: F) -> ShelfResult<Book>
    where
        F: FnOnce(&mut Book),
    {
        let mut next = self.books.clone();
        let book = next
            .iter_mut()
            .find(|b| &b.id == id)
            .ok_or_else(|| ShelfError::UnknownBook(id.clone()))?;
        f(book);
        let updated = book.clone();

        self.commit(next);
        Ok(updated)
    }

    fn commit(&mut self, next: Vec<Book>) {
        match self.store.save(&next) {
            Ok(SaveOutcome::Complete) => {}
            Ok(SaveOutcome::FilesDropped { dropped }) => {
                warn!(
                    dropped,
                    "Library saved without file data; re-add those PDFs to read them later"
                );
            }
            Err(e) => warn!("Failed to save library: {}", e),
        }
        self.books = next;
    }
}

fn matches_filter(book: &Book, term: &str) -> bool {
    book.title.to_lowercase().contains(term)
        || book.author.to_lowercase().contains(term)
        || book.tags.iter().any(|t| t.to_lowercase().contains(term))
        || book.categories.iter().any(|c| c.to_lowercase().contains(term))
}

fn searchable_text(book: &Book) -> String {
    let mut parts: Vec<&str> = vec![book.title.as_str(), book.author.as_str()];
    parts.extend(book.tags.iter().map(String::as_str));
    parts.extend(book.categories.iter().map(String::as_str));
    parts.push(&book.language);
    parts.join(" ").to_lowercase()
}

fn sort_books(items: &mut [&Book], sort: SortKey) {
    match sort {
        SortKey::Title => items.sort_by(|a, b| {
            a.title
                .to_lowercase()
                .cmp(&b.title.to_lowercase())
                .then_with(|| a.title.cmp(&b.title))
        }),
        SortKey::Author => items.sort_by(|a, b| {
            a.author
                .to_lowercase()
                .cmp(&b.author.to_lowercase())
                .then_with(|| a.author.cmp(&b.author))
        }),
        SortKey::LastOpened => items.sort_by(|a, b| b.last_opened.cmp(&a.last_opened)),
        SortKey::AddedDate => items.sort_by(|a, b| b.added_date.cmp(&a.added_date)),
    }
}

/// Catalog shared between the front end and a reading session
#[derive(Clone)]
pub struct SharedCatalog(Arc<Mutex<Catalog>>);

impl SharedCatalog {
    pub fn new(catalog: Catalog) -> Self {
        Self(Arc::new(Mutex::new(catalog)))
    }

    /// Lock the catalog for reading or writing
    pub fn lock(&self) -> MutexGuard<'_, Catalog> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ProgressSink for SharedCatalog {
    fn report_progress(&self, id: &BookId, page: u32) -> ShelfResult<()> {
        self.lock().update_progress(id, page)?;
        Ok(())
    }

    fn report_bookmark(&self, id: &BookId, bookmarked: bool) -> ShelfResult<()> {
        self.lock().set_bookmark(id, bookmarked)
    }

    fn report_page_count(&self, id: &BookId, total_pages: u32) -> ShelfResult<()> {
        let patch = BookPatch {
            total_pages: Some(total_pages),
            ..Default::default()
        };
        self.lock().update(id, &patch)?;
        Ok(())
    }
}
