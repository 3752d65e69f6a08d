//! Dashboard aggregates over the catalog.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::domain::Book;

/// Window for "recently read"
pub const RECENT_WINDOW_DAYS: i64 = 7;

/// Reading statistics for the dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LibraryStats {
    pub total_books: usize,
    /// Books past their first page
    pub books_started: usize,
    /// Books sitting on their last page
    pub books_completed: usize,
    pub bookmarked_books: usize,
    pub total_pages_read: u64,
    /// Opened within the last [`RECENT_WINDOW_DAYS`]
    pub recently_read_books: usize,
}

impl LibraryStats {
    pub fn compute<'a>(books: impl IntoIterator<Item = &'a Book>, now: DateTime<Utc>) -> Self {
        let cutoff = now - Duration::days(RECENT_WINDOW_DAYS);
        let mut stats = Self::default();

        for book in books {
            stats.total_books += 1;
            if book.current_page > 1 {
                stats.books_started += 1;
            }
            if book.total_pages > 0 && book.current_page == book.total_pages {
                stats.books_completed += 1;
            }
            if book.is_bookmarked {
                stats.bookmarked_books += 1;
            }
            stats.total_pages_read += u64::from(book.current_page.saturating_sub(1));
            if book.last_opened >= cutoff {
                stats.recently_read_books += 1;
            }
        }

        stats
    }

    /// Completed books as a rounded percentage
    pub fn completion_rate(&self) -> u32 {
        if self.total_books == 0 {
            return 0;
        }
        ((self.books_completed as f64 / self.total_books as f64) * 100.0).round() as u32
    }
}

/// Reading progress of one book as a rounded percentage
pub fn progress_percent(book: &Book) -> u32 {
    if book.total_pages == 0 {
        return 0;
    }
    ((book.current_page as f64 / book.total_pages as f64) * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BookId;

    fn book(id: &str, current: u32, total: u32) -> Book {
        let mut book = Book::new(BookId::new(id), id, format!("{}.pdf", id)).with_total_pages(total);
        book.current_page = current;
        book
    }

    #[test]
    fn test_stats() {
        let now = Utc::now();
        let mut old = book("a", 1, 10);
        old.last_opened = now - Duration::days(30);
        let mut done = book("b", 10, 10);
        done.is_bookmarked = true;
        let started = book("c", 4, 10);

        let stats = LibraryStats::compute(&[old, done, started], now);

        assert_eq!(stats.total_books, 3);
        assert_eq!(stats.books_started, 2);
        assert_eq!(stats.books_completed, 1);
        assert_eq!(stats.bookmarked_books, 1);
        assert_eq!(stats.total_pages_read, 9 + 3);
        assert_eq!(stats.recently_read_books, 2);
        assert_eq!(stats.completion_rate(), 33);
    }

    #[test]
    fn test_empty_library() {
        let stats = LibraryStats::compute(&[], Utc::now());
        assert_eq!(stats, LibraryStats::default());
        assert_eq!(stats.completion_rate(), 0);
    }

    #[test]
    fn test_unknown_page_count_is_not_completed() {
        let stats = LibraryStats::compute(&[book("a", 1, 0)], Utc::now());
        assert_eq!(stats.books_completed, 0);
        assert_eq!(progress_percent(&book("a", 1, 0)), 0);
        assert_eq!(progress_percent(&book("b", 1, 3)), 33);
    }
}
