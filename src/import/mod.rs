//! Plain-text import: bytes to a segmented [`Book`].
//!
//! The pipeline runs one way, each stage total:
//!
//! ```text
//! bytes -> detect encoding -> decode -> sanitize -> author/title -> segment
//! ```
//!
//! Only reading the source file can fail.

pub mod chapters;
pub mod encoding;
pub mod metadata;
pub mod sanitize;

pub use chapters::{SegmenterConfig, is_chapter_heading, segment, segment_lines};
pub use encoding::{
    DecodedText, Detection, DetectionMethod, DetectorConfig, EncodingCache, TextEncoding, decode,
    detect_encoding,
};
pub use metadata::{FileNameInfo, detect_author, parse_file_name};
pub use sanitize::sanitize;

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::book::{Book, Chapter, DEFAULT_LANGUAGE, Metadata, UNKNOWN_AUTHOR};
use crate::error::{Error, Result};
use crate::util::file_stem;

/// Caller-supplied metadata that wins over anything detected.
#[derive(Debug, Clone, Default)]
pub struct MetadataHints {
    pub title: Option<String>,
    pub author: Option<String>,
}

impl MetadataHints {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}

/// Configuration for text import.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub detector: DetectorConfig,
    pub segmenter: SegmenterConfig,
    /// `dc:language` for every imported book.
    pub language: String,
    /// Author recorded when none is given or found.
    pub default_author: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            segmenter: SegmenterConfig::default(),
            language: DEFAULT_LANGUAGE.to_string(),
            default_author: UNKNOWN_AUTHOR.to_string(),
        }
    }
}

impl ImportConfig {
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

/// A book together with how its source was decoded.
#[derive(Debug, Clone)]
pub struct Imported {
    pub book: Book,
    pub detection: Detection,
    /// Some bytes could not be decoded and were replaced with U+FFFD.
    pub lossy: bool,
}

/// Plain-text importer.
#[derive(Debug, Clone, Default)]
pub struct TextImporter {
    config: ImportConfig,
}

impl TextImporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ImportConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Read and segment the file at `path`.
    ///
    /// Encoding detection goes through `cache`.
    pub fn import(&self, path: &Path, cache: &mut EncodingCache, hints: &MetadataHints) -> Result<Book> {
        self.import_detailed(path, cache, hints).map(|imported| imported.book)
    }

    /// Like [`import`](Self::import), also reporting the detection.
    pub fn import_detailed(
        &self,
        path: &Path,
        cache: &mut EncodingCache,
        hints: &MetadataHints,
    ) -> Result<Imported> {
        let bytes = fs::read(path).map_err(|source| Error::ReadSource {
            path: path.to_path_buf(),
            source,
        })?;
        let detection = cache.detect(path, &bytes, &self.config.detector);
        debug!(
            path = %path.display(),
            encoding = %detection.encoding,
            method = ?detection.method,
            "detected encoding"
        );

        let decoded = decode(&bytes, detection.encoding);
        if decoded.lossy {
            warn!(
                path = %path.display(),
                encoding = %decoded.encoding,
                "undecodable bytes were replaced"
            );
        }

        Ok(Imported {
            book: self.build(&file_stem(path), &decoded.text, hints),
            detection,
            lossy: decoded.lossy,
        })
    }

    /// Import in-memory bytes. `name` plays the role of the file stem.
    pub fn import_bytes(&self, name: &str, bytes: &[u8], hints: &MetadataHints) -> Book {
        let detection = detect_encoding(bytes, &self.config.detector);
        let decoded = decode(bytes, detection.encoding);
        if decoded.lossy {
            warn!(name, encoding = %decoded.encoding, "undecodable bytes were replaced");
        }
        self.build(name, &decoded.text, hints)
    }

    /// Import already-decoded text.
    pub fn import_str(&self, name: &str, text: &str, hints: &MetadataHints) -> Book {
        self.build(name, text, hints)
    }

    fn build(&self, name: &str, text: &str, hints: &MetadataHints) -> Book {
        let text = sanitize(text);
        let lines: Vec<&str> = text.lines().collect();

        // Hints and file names bypass the body sanitizer but still end up
        // in XML.
        let from_name = parse_file_name(name);
        let title = sanitize(hints.title.as_deref().unwrap_or(&from_name.title)).into_owned();
        let author = hints
            .author
            .as_deref()
            .or(from_name.author.as_deref())
            .map(|author| sanitize(author).into_owned())
            .or_else(|| detect_author(lines.iter().copied()))
            .unwrap_or_else(|| self.config.default_author.clone());

        let chapters = segment_lines(lines.iter().copied(), &self.config.segmenter);
        debug!(%title, %author, chapters = chapters.len(), "segmented text");
        if chapters.iter().all(Chapter::is_blank) {
            warn!(%title, "no text found, book has only empty chapters");
        }

        let metadata = Metadata::new(title)
            .with_author(author)
            .with_language(self.config.language.clone());
        Book::new(metadata, chapters)
    }
}
