//! # txtpub
//!
//! Converts plain-text novels into EPUB 3 books.
//!
//! ## Features
//!
//! - Detects the source encoding (BOM, UTF-16 heuristics, UTF-8, GB18030, Big5)
//! - Splits the text into chapters on Chinese and Latin heading patterns
//! - Picks up title and author from the file name or the opening lines
//! - Writes EPUB 3 archives with an NCX for older readers, atomically
//! - Converts whole directories, recording per-file outcomes
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//!
//! use txtpub::{ConvertOptions, Converter};
//!
//! let mut converter = Converter::new(ConvertOptions::default());
//! let report = converter.convert_path(Path::new("《三体》刘慈欣.txt"), None)?;
//! assert!(report.is_success());
//! # Ok::<(), txtpub::Error>(())
//! ```
//!
//! ## Working with Books
//!
//! The pipeline stages can also be driven separately:
//!
//! ```
//! use txtpub::{MetadataHints, TextImporter};
//!
//! let book = TextImporter::new().import_str(
//!     "故事",
//!     "第一章 开始\n今天天气很好。\n第二章 结束\n故事说完了。\n",
//!     &MetadataHints::default().with_author("佚名"),
//! );
//! assert_eq!(book.chapters.len(), 2);
//! assert_eq!(book.chapters[1].title, "第二章 结束");
//! ```

pub mod batch;
pub mod book;
pub mod error;
pub mod export;
pub mod import;
pub mod inspect;
pub(crate) mod util;

use std::path::Path;

pub use batch::{BatchReport, ConvertOptions, Converter, FileOutcome, OutputNaming};
pub use book::{Book, Chapter, Metadata};
pub use error::{Error, Result};
pub use export::{EpubConfig, EpubExporter, Exporter};
pub use import::{
    EncodingCache, ImportConfig, MetadataHints, TextImporter, detect_encoding, sanitize, segment,
};
pub use inspect::{EpubSummary, inspect_epub};

/// Write `book` to `path` as an EPUB with default settings.
///
/// The file appears at `path` only once it is complete.
pub fn write_epub<P: AsRef<Path>>(book: &Book, path: P) -> Result<()> {
    EpubExporter::new().write_to_path(book, path.as_ref())
}
