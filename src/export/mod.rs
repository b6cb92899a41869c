//! Export of segmented books to EPUB.
//!
//! Provides the `Exporter` trait, the EPUB implementation, and the
//! document builders it is made of.
//!
//! # Architecture
//!
//! The `Exporter` trait uses a builder pattern:
//! - `new()` creates an exporter with default configuration
//! - `with_config()` allows customization
//! - `export()` writes to any `Write + Seek` destination
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//!
//! use txtpub::{Book, Chapter, Metadata};
//! use txtpub::export::{EpubExporter, Exporter};
//!
//! let book = Book::new(
//!     Metadata::new("书名"),
//!     vec![Chapter::new("第一章").with_line("内容")],
//! );
//! let mut out = Cursor::new(Vec::new());
//! EpubExporter::new().export(&book, &mut out)?;
//! assert!(!out.into_inner().is_empty());
//! # Ok::<(), std::io::Error>(())
//! ```

use std::io::{self, Seek, Write};

use crate::book::Book;

mod cover;
mod css_gen;
mod epub;
mod xhtml;

pub use cover::{COVER_HREF, COVER_ID, CoverConfig, generate_cover_svg};
pub use css_gen::{StyleConfig, generate_css};
pub use epub::{DEFAULT_NAV_TITLE, EpubConfig, EpubExporter, MIMETYPE};
pub use xhtml::{
    STYLESHEET_HREF, chapter_href, chapter_id, chapter_link, escape_xml, synthesize_chapter,
    synthesize_nav,
};

/// Trait for exporting books to specific formats.
///
/// Exporters use a builder pattern where configuration is held in the struct,
/// and the `export` method writes to any `Write + Seek` destination.
pub trait Exporter {
    /// Export the book to the provided writer.
    ///
    /// The writer can be:
    /// - `std::fs::File` for disk output
    /// - `std::io::Cursor<Vec<u8>>` for seekable in-memory output
    /// - Any other type implementing `Write + Seek`
    fn export<W: Write + Seek>(&self, book: &Book, writer: &mut W) -> io::Result<()>;
}
