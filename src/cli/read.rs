//! `pdfshelf read`: interactive reading sessions and page export.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config;
use crate::core::{ReaderController, ReaderState};
use crate::domain::ThemeMode;
use crate::error::{ShelfError, ShelfResult};

use super::{find_book, open_catalog, open_engine};

/// Options for `pdfshelf read`
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Render this page to `out` and exit
    pub page: Option<u32>,
    pub out: Option<PathBuf>,
    pub zoom: Option<f32>,
    pub theme: Option<ThemeMode>,
}

/// One line of interactive input
#[derive(Debug, Clone, PartialEq)]
enum ReaderCommand {
    Next,
    Previous,
    GoTo(u32),
    ZoomIn,
    ZoomOut,
    Zoom(f32),
    Theme(ThemeMode),
    Bookmark,
    Save(Option<PathBuf>),
    Retry,
    Help,
    Quit,
}

impl std::str::FromStr for ReaderCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or("").to_lowercase();
        let arg = words.next();

        let parsed = match (command.as_str(), arg) {
            ("" | "n" | "next", None) => ReaderCommand::Next,
            ("p" | "prev" | "previous", None) => ReaderCommand::Previous,
            ("g" | "goto" | "page", Some(n)) => {
                ReaderCommand::GoTo(n.parse().with_context(|| format!("Invalid page: {}", n))?)
            }
            ("z" | "zoom", Some("in" | "+")) => ReaderCommand::ZoomIn,
            ("z" | "zoom", Some("out" | "-")) => ReaderCommand::ZoomOut,
            ("z" | "zoom", Some(factor)) => ReaderCommand::Zoom(
                factor
                    .trim_end_matches('%')
                    .parse::<f32>()
                    .map(|f| if factor.ends_with('%') { f / 100.0 } else { f })
                    .with_context(|| format!("Invalid zoom: {}", factor))?,
            ),
            ("t" | "theme", Some(theme)) => ReaderCommand::Theme(theme.parse()?),
            ("b" | "bookmark", None) => ReaderCommand::Bookmark,
            ("s" | "save", path) => ReaderCommand::Save(path.map(PathBuf::from)),
            ("r" | "retry", None) => ReaderCommand::Retry,
            ("h" | "help" | "?", None) => ReaderCommand::Help,
            ("q" | "quit" | "exit", None) => ReaderCommand::Quit,
            (other, _) => match other.parse::<u32>() {
                Ok(page) => ReaderCommand::GoTo(page),
                Err(_) => anyhow::bail!("Unknown command: {} (type 'help')", line.trim()),
            },
        };

        Ok(parsed)
    }
}

const HELP: &str = "\
Commands:
  next | n | <enter>      next page
  prev | p                previous page
  goto N | N              jump to page N
  zoom in | out | 1.5     change zoom (0.5 - 3.0 by default)
  theme light|dark|sepia  change color theme
  bookmark | b            toggle bookmark
  save [file.png]         write the current page as PNG
  retry                   reopen after an error
  quit | q                leave the reader";

/// Entry point for `pdfshelf read`
pub async fn run(book_id: &str, options: ReadOptions) -> Result<()> {
    let cfg = config::config()?;
    let catalog = open_catalog()?;
    let book = find_book(&catalog.lock(), book_id)?;

    let mut settings = cfg.reader.clone();
    if let Some(theme) = options.theme {
        settings.theme = theme;
    }
    if let Some(zoom) = options.zoom {
        settings.initial_zoom = zoom;
    }

    let reader = ReaderController::with_settings(open_engine()?, Arc::new(catalog), settings);
    if let Err(e) = reader.open(&book).await {
        if !continues_after_open_error(&e, options.page.is_some()) {
            return Err(e.into());
        }
    }

    if let Some(page) = options.page {
        let out = options
            .out
            .unwrap_or_else(|| PathBuf::from(format!("{}-p{}.png", book.id, page)));
        return export_page(&reader, page, &out).await;
    }

    interactive(&reader, options.out.as_deref()).await
}

/// Render one page and write it as PNG
async fn export_page(reader: &ReaderController, page: u32, out: &Path) -> Result<()> {
    let total = reader.total_pages();
    if page < 1 || page > total {
        anyhow::bail!("Page {} is outside 1..={}", page, total);
    }

    reader.go_to_page(page).await?;
    if let Some(notice) = reader.take_notices().into_iter().last() {
        anyhow::bail!("{}", notice.message);
    }

    reader.surface().save_png(out)?;
    eprintln!("Wrote page {} to {}", page, out.display());
    Ok(())
}

async fn interactive(reader: &ReaderController, preview: Option<&Path>) -> Result<()> {
    if let Some(book) = reader.book() {
        eprintln!("{} by {}", book.title, book.author);
    }
    eprintln!("Type 'help' for commands.\n");
    report(reader, preview);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read from stdin")? {
        let command = match line.parse::<ReaderCommand>() {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{:#}", e);
                continue;
            }
        };

        match command {
            ReaderCommand::Quit => break,
            ReaderCommand::Help => {
                eprintln!("{}", HELP);
                continue;
            }
            ReaderCommand::Next => warn_on_error(reader.next_page().await),
            ReaderCommand::Previous => warn_on_error(reader.previous_page().await),
            ReaderCommand::GoTo(page) => {
                if page < 1 || page > reader.total_pages() {
                    eprintln!("No page {} (1-{})", page, reader.total_pages());
                }
                warn_on_error(reader.go_to_page(page).await)
            }
            ReaderCommand::ZoomIn => {
                reader.zoom_in().await;
            }
            ReaderCommand::ZoomOut => {
                reader.zoom_out().await;
            }
            ReaderCommand::Zoom(factor) => {
                reader.set_zoom(factor).await;
            }
            ReaderCommand::Theme(theme) => reader.set_theme(theme).await,
            ReaderCommand::Bookmark => match reader.toggle_bookmark() {
                Ok(true) => eprintln!("Bookmarked"),
                Ok(false) => eprintln!("Bookmark removed"),
                Err(e) => eprintln!("{}", e),
            },
            ReaderCommand::Save(path) => {
                let path = path.unwrap_or_else(|| default_snapshot_path(reader));
                match reader.surface().save_png(&path) {
                    Ok(()) => eprintln!("Saved {}", path.display()),
                    Err(e) => eprintln!("{:#}", e),
                }
                continue;
            }
            ReaderCommand::Retry => warn_on_error(reader.retry().await),
        }

        report(reader, preview);
    }

    reader.close();
    Ok(())
}

/// Print status and notices, refreshing the preview file if any
fn report(reader: &ReaderController, preview: Option<&Path>) {
    for notice in reader.take_notices() {
        eprintln!("! {}", notice.message);
    }

    match reader.state() {
        ReaderState::Error { message } => {
            eprintln!("Error: {} (type 'retry' or 'quit')", message);
            return;
        }
        ReaderState::Ready => {}
        other => {
            eprintln!("[{}]", other);
            return;
        }
    }

    eprintln!(
        "Page {}/{}  zoom {:.0}%  {}{}",
        reader.current_page(),
        reader.total_pages(),
        reader.zoom() * 100.0,
        reader.theme(),
        if reader.is_bookmarked() { "  [bookmarked]" } else { "" }
    );

    if let Some(path) = preview {
        if let Err(e) = reader.surface().save_png(path) {
            eprintln!("! {:#}", e);
        }
    }
}

/// Interactive sessions stay up in the error state and offer `retry`
fn continues_after_open_error(err: &ShelfError, exporting: bool) -> bool {
    !exporting && err.is_fatal_to_session()
}

fn warn_on_error(result: ShelfResult<()>) {
    if let Err(e) = result {
        eprintln!("{}", e);
    }
}

fn default_snapshot_path(reader: &ReaderController) -> PathBuf {
    let id = reader
        .book()
        .map(|b| b.id.to_string())
        .unwrap_or_else(|| "page".to_string());
    PathBuf::from(format!("{}-p{}.png", id, reader.current_page()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> ReaderCommand {
        line.parse().unwrap()
    }

    #[test]
    fn test_navigation_commands() {
        assert_eq!(parse(""), ReaderCommand::Next);
        assert_eq!(parse("next"), ReaderCommand::Next);
        assert_eq!(parse("p"), ReaderCommand::Previous);
        assert_eq!(parse("goto 12"), ReaderCommand::GoTo(12));
        assert_eq!(parse("7"), ReaderCommand::GoTo(7));
        assert!("goto x".parse::<ReaderCommand>().is_err());
    }

    #[test]
    fn test_zoom_commands() {
        assert_eq!(parse("zoom in"), ReaderCommand::ZoomIn);
        assert_eq!(parse("z -"), ReaderCommand::ZoomOut);
        assert_eq!(parse("zoom 1.5"), ReaderCommand::Zoom(1.5));
        assert_eq!(parse("zoom 150%"), ReaderCommand::Zoom(1.5));
    }

    #[test]
    fn test_other_commands() {
        assert_eq!(parse("theme night"), ReaderCommand::Theme(ThemeMode::Dark));
        assert_eq!(parse("b"), ReaderCommand::Bookmark);
        assert_eq!(parse("save"), ReaderCommand::Save(None));
        assert_eq!(
            parse("save out.png"),
            ReaderCommand::Save(Some(PathBuf::from("out.png")))
        );
        assert_eq!(parse("QUIT"), ReaderCommand::Quit);
        assert!("dance".parse::<ReaderCommand>().is_err());
    }

    #[test]
    fn test_open_failure_keeps_interactive_session() {
        let broken = ShelfError::DocumentOpenFailure("bad xref".into());
        assert!(continues_after_open_error(&broken, false));
        assert!(!continues_after_open_error(&broken, true));

        let missing = ShelfError::MissingFileData {
            title: "Rust".into(),
        };
        assert!(continues_after_open_error(&missing, false));
        assert!(!continues_after_open_error(&ShelfError::NoActiveBook, false));
    }
}
