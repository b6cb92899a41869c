//! Book model shared by the text importer and the EPUB exporter.

use chrono::Utc;
use uuid::Uuid;

/// Title used for content that precedes the first chapter heading.
pub const PREFACE_TITLE: &str = "前言";

/// Title used for a trailing run of content with no heading, and for
/// documents without any heading at all.
pub const BODY_TITLE: &str = "正文";

/// Author recorded when none is given or detected.
pub const UNKNOWN_AUTHOR: &str = "无";

/// Default `dc:language` tag.
pub const DEFAULT_LANGUAGE: &str = "zh";

/// A segmented text book, ready for packaging.
///
/// `chapters` is in reading order; exporters must not reorder it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Book {
    pub metadata: Metadata,
    pub chapters: Vec<Chapter>,
}

/// Book metadata written to the package document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub title: String,
    pub author: String,
    pub language: String,
    /// Unique identifier, `urn:uuid:` form.
    pub identifier: String,
    /// `dcterms:modified` value (`YYYY-MM-DDThh:mm:ssZ`).
    pub modified: String,
}

/// One narrative unit: a heading and the lines that follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub title: String,
    pub body: Vec<String>,
}

impl Book {
    pub fn new(metadata: Metadata, chapters: Vec<Chapter>) -> Self {
        Self { metadata, chapters }
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            title: String::new(),
            author: UNKNOWN_AUTHOR.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            identifier: new_identifier(),
            modified: modified_now(),
        }
    }
}

impl Metadata {
    /// Metadata with a fresh identifier and the current timestamp.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn with_modified(mut self, modified: impl Into<String>) -> Self {
        self.modified = modified.into();
        self
    }
}

impl Chapter {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: Vec::new(),
        }
    }

    pub fn with_line(mut self, line: impl Into<String>) -> Self {
        self.body.push(line.into());
        self
    }

    /// True if every body line is blank.
    pub fn is_blank(&self) -> bool {
        self.body.iter().all(|line| line.trim().is_empty())
    }
}

/// Generate a fresh `urn:uuid:` identifier.
pub fn new_identifier() -> String {
    format!("urn:uuid:{}", Uuid::new_v4())
}

/// Current UTC instant in the `dcterms:modified` format.
pub fn modified_now() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
