//! Upload boundary: turns PDF files into library records.

use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use crate::core::metadata::MetadataExtractor;
use crate::domain::{Book, BookId};
use crate::error::{ShelfError, ShelfResult};
use crate::library::SharedCatalog;

const PDF_MIME: &str = "application/pdf";

/// Whether the file's declared type (guessed from its name) is PDF
pub fn is_declared_pdf(path: &Path) -> bool {
    mime_guess::from_path(path).first_raw() == Some(PDF_MIME)
}

/// Extra labels applied to every imported book
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub tags: Vec<String>,
    pub categories: Vec<String>,
}

/// What happened to one file
#[derive(Debug)]
pub enum ImportOutcome {
    Added { id: BookId, title: String },
    /// Skipped before reading, e.g. not a PDF
    Rejected(ShelfError),
    Failed(ShelfError),
}

#[derive(Debug)]
pub struct ImportEntry {
    pub path: PathBuf,
    pub outcome: ImportOutcome,
}

/// Per-file results of an import batch
#[derive(Debug, Default)]
pub struct ImportReport {
    pub entries: Vec<ImportEntry>,
}

impl ImportReport {
    pub fn added(&self) -> usize {
        self.count(|o| matches!(o, ImportOutcome::Added { .. }))
    }

    pub fn rejected(&self) -> usize {
        self.count(|o| matches!(o, ImportOutcome::Rejected(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ImportOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&ImportOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }
}

/// Adds uploaded PDFs to the catalog
pub struct Importer {
    catalog: SharedCatalog,
    extractor: MetadataExtractor,
}

impl Importer {
    pub fn new(catalog: SharedCatalog, extractor: MetadataExtractor) -> Self {
        Self { catalog, extractor }
    }

    /// Import files one at a time; a bad file never stops the batch
    #[instrument(skip(self, paths, options), fields(files = paths.len()))]
    pub async fn import(&self, paths: &[PathBuf], options: &ImportOptions) -> ImportReport {
        let mut report = ImportReport::default();

        for (index, path) in paths.iter().enumerate() {
            let outcome = self.import_path(path, index, options).await;
            if let ImportOutcome::Rejected(ref e) | ImportOutcome::Failed(ref e) = outcome {
                warn!(path = %path.display(), "{}", e);
            }
            report.entries.push(ImportEntry {
                path: path.clone(),
                outcome,
            });
        }

        info!(
            added = report.added(),
            rejected = report.rejected(),
            failed = report.failed(),
            "Import finished"
        );
        report
    }

    async fn import_path(&self, path: &Path, index: usize, options: &ImportOptions) -> ImportOutcome {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        if !is_declared_pdf(path) {
            return ImportOutcome::Rejected(ShelfError::InvalidFileType { file_name });
        }

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => return ImportOutcome::Failed(ShelfError::Io(e)),
        };

        match self.import_bytes(&file_name, bytes, index, options).await {
            Ok(book) => ImportOutcome::Added {
                id: book.id,
                title: book.title,
            },
            Err(e) => ImportOutcome::Failed(e),
        }
    }

    /// Import an in-memory upload named `file_name`
    pub async fn import_bytes(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        index: usize,
        options: &ImportOptions,
    ) -> ShelfResult<Book> {
        if !is_declared_pdf(Path::new(file_name)) {
            return Err(ShelfError::InvalidFileType {
                file_name: file_name.to_string(),
            });
        }

        let metadata = self.extractor.extract(bytes.clone()).await;

        let mut catalog = self.catalog.lock();
        let mut offset = index;
        let mut id = BookId::generate(offset);
        while catalog.get(&id).is_some() {
            offset += 1;
            id = BookId::generate(offset);
        }

        let book = metadata
            .into_book(id, file_name, bytes)
            .with_tags(options.tags.iter().cloned())
            .with_categories(options.categories.iter().cloned());

        catalog.add(book.clone())?;
        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_type_comes_from_name() {
        assert!(is_declared_pdf(Path::new("report.pdf")));
        assert!(is_declared_pdf(Path::new("/tmp/Report.PDF")));
        assert!(!is_declared_pdf(Path::new("notes.txt")));
        assert!(!is_declared_pdf(Path::new("cover.png")));
        assert!(!is_declared_pdf(Path::new("no_extension")));
    }

    #[test]
    fn test_report_counts() {
        let report = ImportReport {
            entries: vec![
                ImportEntry {
                    path: "a.pdf".into(),
                    outcome: ImportOutcome::Added {
                        id: BookId::new("1"),
                        title: "a".into(),
                    },
                },
                ImportEntry {
                    path: "b.txt".into(),
                    outcome: ImportOutcome::Rejected(ShelfError::InvalidFileType {
                        file_name: "b.txt".into(),
                    }),
                },
            ],
        };

        assert_eq!(report.added(), 1);
        assert_eq!(report.rejected(), 1);
        assert_eq!(report.failed(), 0);
    }
}
