//! Book records and partial updates.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Author used when the document carries none
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// Language used when the document carries none
pub const UNKNOWN_LANGUAGE: &str = "Unknown";

/// Cover shown when no thumbnail could be rendered
pub const PLACEHOLDER_COVER: &str = "/placeholder.svg";

/// Opaque book identifier (upload time in millis plus batch index)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(String);

impl BookId {
    /// Generate an id for the `index`-th file of an upload batch
    pub fn generate(index: usize) -> Self {
        let millis = Utc::now().timestamp_millis().max(0) as u64;
        Self((millis + index as u64).to_string())
    }

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BookId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Raw PDF bytes shared between the catalog and its snapshots.
///
/// Serialized as base64. Readers must call [`FileData::private_copy`]
/// rather than hand the shared buffer to a rendering engine.
#[derive(Clone, PartialEq, Eq)]
pub struct FileData(Arc<[u8]>);

impl FileData {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Arc::from(bytes))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Owned copy that can be consumed by an engine
    pub fn private_copy(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl std::fmt::Debug for FileData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FileData({} bytes)", self.0.len())
    }
}

impl Serialize for FileData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for FileData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(FileData::new)
            .map_err(serde::de::Error::custom)
    }
}

/// A book in the library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,

    pub title: String,

    pub author: String,

    /// Name of the uploaded file
    pub file_name: String,

    pub file_size_bytes: u64,

    pub last_opened: DateTime<Utc>,

    pub added_date: DateTime<Utc>,

    /// Raw PDF bytes (dropped when storage runs out of room)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileData>,

    /// PNG data URL or [`PLACEHOLDER_COVER`]
    pub cover_url: String,

    /// 0 until the page count is known
    #[serde(default)]
    pub total_pages: u32,

    /// 1-based
    #[serde(default = "default_current_page")]
    pub current_page: u32,

    #[serde(default)]
    pub categories: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub language: String,

    #[serde(default)]
    pub is_bookmarked: bool,
}

fn default_current_page() -> u32 {
    1
}

impl Book {
    /// Create a book with library defaults for everything but identity
    pub fn new(id: BookId, title: impl Into<String>, file_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: title.into(),
            author: UNKNOWN_AUTHOR.to_string(),
            file_name: file_name.into(),
            file_size_bytes: 0,
            last_opened: now,
            added_date: now,
            file: None,
            cover_url: PLACEHOLDER_COVER.to_string(),
            total_pages: 0,
            current_page: 1,
            categories: Vec::new(),
            tags: Vec::new(),
            language: UNKNOWN_LANGUAGE.to_string(),
            is_bookmarked: false,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Attach file bytes, updating the recorded size
    pub fn with_file(mut self, bytes: Vec<u8>) -> Self {
        self.file_size_bytes = bytes.len() as u64;
        self.file = Some(FileData::new(bytes));
        self
    }

    pub fn with_total_pages(mut self, total_pages: u32) -> Self {
        self.total_pages = total_pages;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    pub fn with_categories(
        mut self,
        categories: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.categories.extend(categories.into_iter().map(Into::into));
        self
    }

    /// Whether the PDF bytes are still available for reading
    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }

    /// Whether `page` is a valid position in this book
    pub fn is_valid_page(&self, page: u32) -> bool {
        page >= 1 && (self.total_pages == 0 || page <= self.total_pages)
    }

    /// Record reading progress; `last_opened` always moves forward
    pub fn record_progress(&mut self, page: u32, now: DateTime<Utc>) {
        self.current_page = page;
        self.last_opened = advance_timestamp(self.last_opened, now);
    }

    /// Apply a partial update
    pub fn apply(&mut self, patch: &BookPatch) {
        if let Some(ref title) = patch.title {
            self.title = title.clone();
        }
        if let Some(ref author) = patch.author {
            self.author = author.clone();
        }
        if let Some(ref language) = patch.language {
            self.language = language.clone();
        }
        if let Some(ref tags) = patch.tags {
            self.tags = tags.clone();
        }
        if let Some(ref categories) = patch.categories {
            self.categories = categories.clone();
        }
        if let Some(total_pages) = patch.total_pages {
            self.total_pages = total_pages;
        }
        if let Some(current_page) = patch.current_page {
            self.current_page = current_page;
        }
        if let Some(last_opened) = patch.last_opened {
            self.last_opened = advance_timestamp(self.last_opened, last_opened);
        }
        if let Some(is_bookmarked) = patch.is_bookmarked {
            self.is_bookmarked = is_bookmarked;
        }
    }
}

/// Partial update for a [`Book`]; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
    pub tags: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub total_pages: Option<u32>,
    pub current_page: Option<u32>,
    pub last_opened: Option<DateTime<Utc>>,
    pub is_bookmarked: Option<bool>,
}

impl BookPatch {
    /// Progress update: new page, opened now
    pub fn progress(page: u32) -> Self {
        Self {
            current_page: Some(page),
            last_opened: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn bookmarked(is_bookmarked: bool) -> Self {
        Self {
            is_bookmarked: Some(is_bookmarked),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Clamp a stored page into `[1, total_pages]` (any page >= 1 while unknown)
pub fn clamp_page(page: u32, total_pages: u32) -> u32 {
    if total_pages == 0 {
        page.max(1)
    } else {
        page.clamp(1, total_pages)
    }
}

/// Returns `now`, or `previous + 1ms` if the clock has not moved past it
fn advance_timestamp(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + Duration::milliseconds(1)
    }
}
