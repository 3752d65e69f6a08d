//! Command-line interface for pdfshelf.
//!
//! Provides commands for adding PDFs, browsing and searching the library,
//! reading books page by page, and managing bookmarks and metadata.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};

use crate::adapters::{PdfEngine, PdfiumEngine};
use crate::config;
use crate::core::{ImportOptions, ImportOutcome, Importer, MetadataExtractor};
use crate::domain::{Book, BookPatch, ThemeMode};
use crate::library::{
    progress_percent, Catalog, FileSlot, LibraryStats, LibraryStore, SharedCatalog, SortKey,
    DEFAULT_RECENT_LIMIT,
};

pub mod read;

/// pdfshelf - Personal PDF library with reading progress
#[derive(Parser, Debug)]
#[command(name = "pdfshelf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add PDF files to the library
    Add {
        /// Files to add
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Tags to apply (comma-separated)
        #[arg(short, long)]
        tags: Option<String>,

        /// Categories to apply (comma-separated)
        #[arg(short, long)]
        categories: Option<String>,
    },

    /// List books in the library
    List {
        /// Only show books whose title, author, tags or categories match
        #[arg(short, long)]
        filter: Option<String>,

        /// Sort order
        #[arg(short, long, value_enum, default_value = "added")]
        sort: SortArg,

        /// Maximum number of books to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Search the library (every word must match)
    Search {
        /// Search query
        query: String,
    },

    /// Show details of a book
    Show {
        /// Book ID (prefix match)
        book_id: String,
    },

    /// Read a book interactively, or render one page to an image
    Read {
        /// Book ID (prefix match)
        book_id: String,

        /// Page to render (non-interactive)
        #[arg(short, long)]
        page: Option<u32>,

        /// PNG output path (with --page, or a live preview file when interactive)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Zoom factor
        #[arg(short, long)]
        zoom: Option<f32>,

        /// Color theme
        #[arg(long, value_enum)]
        theme: Option<ThemeArg>,
    },

    /// Toggle the bookmark on a book
    Bookmark {
        /// Book ID (prefix match)
        book_id: String,
    },

    /// Edit book metadata
    Edit {
        /// Book ID (prefix match)
        book_id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        author: Option<String>,

        #[arg(long)]
        language: Option<String>,

        /// Replace tags (comma-separated)
        #[arg(long)]
        tags: Option<String>,

        /// Replace categories (comma-separated)
        #[arg(long)]
        categories: Option<String>,
    },

    /// Remove a book from the library
    Delete {
        /// Book ID (prefix match)
        book_id: String,
    },

    /// Remove every book from the library
    Clear {
        /// Skip the confirmation check
        #[arg(long)]
        yes: bool,
    },

    /// Show reading statistics
    Stats,

    /// List recently opened books
    Recent {
        /// Maximum number of books to show
        #[arg(short, long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: usize,
    },

    /// List bookmarked books
    Bookmarks,

    /// Show resolved configuration (debug)
    Config,
}

/// Sort order for CLI (maps to SortKey)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortArg {
    Title,
    Author,
    /// Most recently opened first
    Opened,
    /// Most recently added first
    Added,
}

impl From<SortArg> for SortKey {
    fn from(s: SortArg) -> Self {
        match s {
            SortArg::Title => SortKey::Title,
            SortArg::Author => SortKey::Author,
            SortArg::Opened => SortKey::LastOpened,
            SortArg::Added => SortKey::AddedDate,
        }
    }
}

/// Theme for CLI (maps to ThemeMode)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ThemeArg {
    Light,
    Dark,
    Sepia,
}

impl From<ThemeArg> for ThemeMode {
    fn from(t: ThemeArg) -> Self {
        match t {
            ThemeArg::Light => ThemeMode::Light,
            ThemeArg::Dark => ThemeMode::Dark,
            ThemeArg::Sepia => ThemeMode::Sepia,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Add {
                files,
                tags,
                categories,
            } => add_books(files, tags, categories).await,
            Commands::List {
                filter,
                sort,
                limit,
            } => list_books(filter.as_deref(), sort.into(), limit),
            Commands::Search { query } => search_books(&query),
            Commands::Show { book_id } => show_book(&book_id),
            Commands::Read {
                book_id,
                page,
                out,
                zoom,
                theme,
            } => {
                let options = read::ReadOptions {
                    page,
                    out,
                    zoom,
                    theme: theme.map(ThemeMode::from),
                };
                read::run(&book_id, options).await
            }
            Commands::Bookmark { book_id } => toggle_bookmark(&book_id),
            Commands::Edit {
                book_id,
                title,
                author,
                language,
                tags,
                categories,
            } => {
                let patch = BookPatch {
                    title,
                    author,
                    language,
                    tags: tags.as_deref().map(split_list),
                    categories: categories.as_deref().map(split_list),
                    ..Default::default()
                };
                edit_book(&book_id, &patch)
            }
            Commands::Delete { book_id } => delete_book(&book_id),
            Commands::Clear { yes } => clear_library(yes),
            Commands::Stats => show_stats(),
            Commands::Recent { limit } => list_recent(limit),
            Commands::Bookmarks => list_bookmarks(),
            Commands::Config => show_config().await,
        }
    }
}

/// Open the catalog described by the resolved configuration
pub(crate) fn open_catalog() -> Result<SharedCatalog> {
    let cfg = config::config()?;
    let store_dir = cfg.store_dir();
    std::fs::create_dir_all(&store_dir)
        .with_context(|| format!("Failed to create store directory: {}", store_dir.display()))?;

    let slot = FileSlot::new(store_dir).with_quota(cfg.storage.quota_bytes);
    let store = LibraryStore::new(Arc::new(slot), cfg.storage.key.clone());
    Ok(SharedCatalog::new(Catalog::open(store)))
}

/// Rendering engine described by the resolved configuration
pub(crate) fn open_engine() -> Result<Arc<dyn PdfEngine>> {
    Ok(Arc::new(pdfium_engine(config::config()?)))
}

fn pdfium_engine(cfg: &config::ResolvedConfig) -> PdfiumEngine {
    match cfg.pdfium_library {
        Some(ref path) => PdfiumEngine::with_library_path(path),
        None => PdfiumEngine::new(),
    }
}

/// Find a book by ID prefix
pub(crate) fn find_book(catalog: &Catalog, id_prefix: &str) -> Result<Book> {
    let matches: Vec<&Book> = catalog
        .books()
        .iter()
        .filter(|b| b.id.as_str().starts_with(id_prefix))
        .collect();

    match matches.as_slice() {
        [book] => Ok((*book).clone()),
        [] => anyhow::bail!("Book not found: {}", id_prefix),
        _ => anyhow::bail!(
            "Book ID '{}' is ambiguous ({} matches); use more characters",
            id_prefix,
            matches.len()
        ),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

fn print_table<'a>(books: impl IntoIterator<Item = &'a Book>) {
    println!(
        "{:<16} {:<40} {:<24} {:>9} {:>4}",
        "ID", "TITLE", "AUTHOR", "PAGE", "BM"
    );
    println!("{}", "-".repeat(97));

    for book in books {
        let page = if book.total_pages > 0 {
            format!("{}/{}", book.current_page, book.total_pages)
        } else {
            book.current_page.to_string()
        };
        println!(
            "{:<16} {:<40} {:<24} {:>9} {:>4}",
            book.id.as_str(),
            truncate(&book.title, 40),
            truncate(&book.author, 24),
            page,
            if book.is_bookmarked { "*" } else { "" }
        );
    }
}

/// Add PDF files to the library
async fn add_books(
    files: Vec<PathBuf>,
    tags: Option<String>,
    categories: Option<String>,
) -> Result<()> {
    let cfg = config::config()?;
    let catalog = open_catalog()?;
    let extractor = MetadataExtractor::new(open_engine()?).with_cover_scale(cfg.cover_scale);
    let importer = Importer::new(catalog, extractor);

    let options = ImportOptions {
        tags: tags.as_deref().map(split_list).unwrap_or_default(),
        categories: categories.as_deref().map(split_list).unwrap_or_default(),
    };
    let report = importer.import(&files, &options).await;

    for entry in &report.entries {
        match &entry.outcome {
            ImportOutcome::Added { id, title } => {
                eprintln!("Added {} ({})", title, id);
            }
            ImportOutcome::Rejected(e) => {
                eprintln!("Skipped {}: {}", entry.path.display(), e);
            }
            ImportOutcome::Failed(e) => {
                eprintln!("Failed {}: {}", entry.path.display(), e);
            }
        }
    }

    eprintln!(
        "\n{} added, {} skipped, {} failed",
        report.added(),
        report.rejected(),
        report.failed()
    );

    if report.added() == 0 {
        anyhow::bail!("No books were added");
    }
    Ok(())
}

/// List books in the library
fn list_books(filter: Option<&str>, sort: SortKey, limit: usize) -> Result<()> {
    let catalog = open_catalog()?;
    let catalog = catalog.lock();

    if catalog.is_empty() {
        println!("Library is empty. Use 'pdfshelf add <file.pdf>' to add books.");
        return Ok(());
    }

    let books = catalog.list(filter, sort);
    if books.is_empty() {
        println!("No books match: {}", filter.unwrap_or_default());
        return Ok(());
    }

    print_table(books.iter().take(limit).copied());
    println!("\nShowing {} of {} books", books.len().min(limit), catalog.len());

    Ok(())
}

/// Search the library
fn search_books(query: &str) -> Result<()> {
    let catalog = open_catalog()?;
    let catalog = catalog.lock();

    let results = catalog.search(query);
    if results.is_empty() {
        println!("No results found for: {}", query);
        return Ok(());
    }

    println!("Found {} result(s) for \"{}\":\n", results.len(), query);
    print_table(results);

    Ok(())
}

/// Show details of a book
fn show_book(book_id: &str) -> Result<()> {
    let catalog = open_catalog()?;
    let book = find_book(&catalog.lock(), book_id)?;

    println!("  ID:        {}", book.id);
    println!("  Title:     {}", book.title);
    println!("  Author:    {}", book.author);
    println!("  File:      {} ({} bytes)", book.file_name, book.file_size_bytes);
    if !book.has_file() {
        println!("             (file data not stored, add the PDF again to read it)");
    }
    println!("  Language:  {}", book.language);
    println!(
        "  Progress:  page {} of {} ({}%)",
        book.current_page,
        book.total_pages,
        progress_percent(&book)
    );
    println!("  Bookmark:  {}", if book.is_bookmarked { "yes" } else { "no" });
    println!("  Added:     {}", book.added_date);
    println!("  Opened:    {}", book.last_opened);
    if !book.tags.is_empty() {
        println!("  Tags:      {}", book.tags.join(", "));
    }
    if !book.categories.is_empty() {
        println!("  Categories: {}", book.categories.join(", "));
    }

    Ok(())
}

fn toggle_bookmark(book_id: &str) -> Result<()> {
    let catalog = open_catalog()?;
    let mut catalog = catalog.lock();
    let book = find_book(&catalog, book_id)?;

    let bookmarked = catalog.toggle_bookmark(&book.id)?;
    if bookmarked {
        println!("Bookmarked: {}", book.title);
    } else {
        println!("Removed bookmark: {}", book.title);
    }
    Ok(())
}

fn edit_book(book_id: &str, patch: &BookPatch) -> Result<()> {
    if patch.is_empty() {
        anyhow::bail!("Nothing to change. Pass --title, --author, --language, --tags or --categories");
    }

    let catalog = open_catalog()?;
    let mut catalog = catalog.lock();
    let book = find_book(&catalog, book_id)?;

    let updated = catalog.update(&book.id, patch)?;
    println!("Updated: {} by {}", updated.title, updated.author);
    Ok(())
}

fn delete_book(book_id: &str) -> Result<()> {
    let catalog = open_catalog()?;
    let mut catalog = catalog.lock();
    let book = find_book(&catalog, book_id)?;

    let removed = catalog.delete(&book.id)?;
    println!("Deleted: {}", removed.title);
    Ok(())
}

fn clear_library(yes: bool) -> Result<()> {
    let catalog = open_catalog()?;
    let mut catalog = catalog.lock();

    if !yes {
        anyhow::bail!(
            "This removes all {} books and their reading progress. Re-run with --yes to confirm",
            catalog.len()
        );
    }

    let count = catalog.len();
    catalog.clear();
    println!("Removed {} books", count);
    Ok(())
}

fn show_stats() -> Result<()> {
    let catalog = open_catalog()?;
    let catalog = catalog.lock();
    let stats = LibraryStats::compute(catalog.books(), Utc::now());

    println!("Books:             {}", stats.total_books);
    println!("Started:           {}", stats.books_started);
    println!("Completed:         {}", stats.books_completed);
    println!("Bookmarked:        {}", stats.bookmarked_books);
    println!("Pages read:        {}", stats.total_pages_read);
    println!("Read this week:    {}", stats.recently_read_books);
    println!("Completion rate:   {}%", stats.completion_rate());

    Ok(())
}

fn list_recent(limit: usize) -> Result<()> {
    let catalog = open_catalog()?;
    let catalog = catalog.lock();

    let books = catalog.recent(limit);
    if books.is_empty() {
        println!("No books opened yet");
        return Ok(());
    }

    print_table(books);
    Ok(())
}

fn list_bookmarks() -> Result<()> {
    let catalog = open_catalog()?;
    let catalog = catalog.lock();

    let books = catalog.bookmarked();
    if books.is_empty() {
        println!("No bookmarked books. Use 'pdfshelf bookmark <id>' to add one.");
        return Ok(());
    }

    print_table(books);
    Ok(())
}

/// Show the resolved configuration (for debugging)
async fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:   {}", cfg.home.display());
    println!("  Store:  {}", cfg.store_dir().display());
    println!(
        "  Pdfium: {}",
        cfg.pdfium_library
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(search next to executable, then system)".to_string())
    );
    match pdfium_engine(cfg).health_check().await {
        Ok(()) => println!("  Status: loaded"),
        Err(e) => println!("  Status: unavailable ({})", e),
    }
    println!();
    println!("Storage:");
    println!("  Key:    {}", cfg.storage.key);
    match cfg.storage.quota_bytes {
        Some(quota) => println!("  Quota:  {} bytes", quota),
        None => println!("  Quota:  unlimited"),
    }
    println!();
    println!("Reader:");
    println!("  Zoom:   {} - {} (step {})", cfg.reader.min_zoom, cfg.reader.max_zoom, cfg.reader.zoom_step);
    println!("  Theme:  {}", cfg.reader.theme);
    println!("  Cover:  {}x", cfg.cover_scale);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BookId;
    use crate::library::MemorySlot;

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("rust, async ,,books"), vec!["rust", "async", "books"]);
        assert!(split_list(" , ").is_empty());
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Les Misérables: Tome Premier", 12), "Les Misér...");
    }

    #[test]
    fn test_find_book_by_prefix() {
        let mut catalog = Catalog::open(LibraryStore::with_default_key(Arc::new(MemorySlot::new())));
        catalog
            .add(Book::new(BookId::new("1700000000000"), "Dune", "dune.pdf"))
            .unwrap();
        catalog
            .add(Book::new(BookId::new("1700000000001"), "Emma", "emma.pdf"))
            .unwrap();

        assert_eq!(find_book(&catalog, "1700000000001").unwrap().title, "Emma");
        assert!(find_book(&catalog, "17").is_err());
        assert!(find_book(&catalog, "9").is_err());
    }

    #[test]
    fn test_cli_parses_read_options() {
        let cli = Cli::parse_from([
            "pdfshelf", "read", "1700", "--page", "3", "--out", "page.png", "--theme", "sepia",
        ]);
        match cli.command {
            Commands::Read {
                book_id,
                page,
                out,
                theme,
                ..
            } => {
                assert_eq!(book_id, "1700");
                assert_eq!(page, Some(3));
                assert_eq!(out, Some(PathBuf::from("page.png")));
                assert!(matches!(theme, Some(ThemeArg::Sepia)));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
