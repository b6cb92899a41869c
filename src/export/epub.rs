//! EPUB exporter.
//!
//! Creates EPUB 3 files (with an EPUB 2 NCX for older readers) from a
//! segmented [`Book`]. Archive layout:
//!
//! ```text
//! mimetype
//! META-INF/container.xml
//! OEBPS/content.opf
//! OEBPS/toc.ncx
//! OEBPS/nav.xhtml
//! OEBPS/style.css
//! OEBPS/cover.svg          (unless disabled)
//! OEBPS/chapter1.xhtml ... chapterN.xhtml
//! ```

use std::fs;
use std::io::{self, Seek, Write};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::book::{Book, Chapter, Metadata};
use crate::error::{Error, Result};

use super::Exporter;
use super::cover::{COVER_HREF, COVER_ID, COVER_MEDIA_TYPE, CoverConfig, generate_cover_svg};
use super::css_gen::{StyleConfig, generate_css};
use super::xhtml::{
    STYLESHEET_HREF, chapter_href, chapter_id, chapter_link, escape_xml, synthesize_chapter,
    synthesize_nav,
};

/// Title of the navigation document.
pub const DEFAULT_NAV_TITLE: &str = "目录";

/// Configuration for EPUB export.
#[derive(Debug, Clone)]
pub struct EpubConfig {
    /// Compression level for deflate (0-9, default 6).
    pub compression_level: Option<u32>,
    /// Heading of the navigation document.
    pub nav_title: String,
    pub style: StyleConfig,
    /// Generated cover; `None` leaves the book without one.
    pub cover: Option<CoverConfig>,
}

impl Default for EpubConfig {
    fn default() -> Self {
        Self {
            compression_level: None,
            nav_title: DEFAULT_NAV_TITLE.to_string(),
            style: StyleConfig::default(),
            cover: Some(CoverConfig::default()),
        }
    }
}

impl EpubConfig {
    pub fn with_cover(mut self, cover: Option<CoverConfig>) -> Self {
        self.cover = cover;
        self
    }
}

/// EPUB format exporter.
///
/// # Example
///
/// ```no_run
/// use txtpub::{Book, Chapter, Metadata};
/// use txtpub::export::EpubExporter;
///
/// let book = Book::new(
///     Metadata::new("My Book").with_author("Me"),
///     vec![Chapter::new("第一章").with_line("内容")],
/// );
/// EpubExporter::new().write_to_path(&book, "output/My Book.epub".as_ref())?;
/// # Ok::<(), txtpub::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct EpubExporter {
    config: EpubConfig,
}

impl EpubExporter {
    /// Create a new exporter with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the exporter with custom settings.
    pub fn with_config(mut self, config: EpubConfig) -> Self {
        self.config = config;
        self
    }

    /// Write `book` to `path` atomically.
    ///
    /// The archive is written to a temporary file in the same directory and
    /// renamed over `path` only once complete. On failure the temporary file
    /// is removed and whatever was at `path` before is left untouched.
    pub fn write_to_path(&self, book: &Book, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let write_error = |source: io::Error| Error::WriteArchive {
            path: path.to_path_buf(),
            source,
        };

        let mut builder = tempfile::Builder::new();
        builder.prefix(".txtpub-").suffix(".epub.part");
        // Same mode as a plain create: 0666 minus the umask.
        #[cfg(unix)]
        builder.permissions(fs::Permissions::from_mode(0o666));
        let mut tmp = builder.tempfile_in(dir).map_err(write_error)?;
        debug!(tmp = %tmp.path().display(), target = %path.display(), "writing archive");

        self.export(book, tmp.as_file_mut()).map_err(write_error)?;
        // Replacing a file keeps its mode.
        if let Ok(existing) = fs::metadata(path)
            && existing.is_file()
        {
            tmp.as_file()
                .set_permissions(existing.permissions())
                .map_err(write_error)?;
        }
        tmp.as_file().sync_all().map_err(write_error)?;
        tmp.persist(path).map_err(|e| write_error(e.error))?;
        Ok(())
    }
}

impl Exporter for EpubExporter {
    fn export<W: Write + Seek>(&self, book: &Book, writer: &mut W) -> io::Result<()> {
        let mut zip = ZipWriter::new(writer);

        // Fixed entry timestamps keep output reproducible.
        let compression_level = self.config.compression_level.unwrap_or(6);
        let stored = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .last_modified_time(DateTime::default());
        let deflated = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(compression_level as i64))
            .last_modified_time(DateTime::default());

        // 1. Write mimetype (must be first, uncompressed)
        zip.start_file("mimetype", stored).map_err(io_error)?;
        zip.write_all(MIMETYPE)?;

        // 2. Write container.xml
        zip.start_file("META-INF/container.xml", deflated)
            .map_err(io_error)?;
        zip.write_all(CONTAINER_XML)?;

        // 3. Build manifest and spine; ids and file names share one index
        let mut manifest_items = vec![
            ManifestItem::new("ncx", "toc.ncx", "application/x-dtbncx+xml"),
            ManifestItem::new("nav", "nav.xhtml", "application/xhtml+xml").with_properties("nav"),
            ManifestItem::new("css", STYLESHEET_HREF, "text/css"),
        ];
        if self.config.cover.is_some() {
            manifest_items.push(
                ManifestItem::new(COVER_ID, COVER_HREF, COVER_MEDIA_TYPE)
                    .with_properties("cover-image"),
            );
        }
        let mut spine_refs = Vec::with_capacity(book.chapters.len());
        for index in 1..=book.chapters.len() {
            manifest_items.push(ManifestItem::new(
                chapter_id(index),
                chapter_href(index),
                "application/xhtml+xml",
            ));
            spine_refs.push(chapter_id(index));
        }

        // 4. Write content.opf
        let opf = generate_opf(&book.metadata, &manifest_items, &spine_refs);
        zip.start_file("OEBPS/content.opf", deflated)
            .map_err(io_error)?;
        zip.write_all(opf.as_bytes())?;

        // 5. Write toc.ncx
        let ncx = generate_ncx(&book.metadata, &book.chapters);
        zip.start_file("OEBPS/toc.ncx", deflated)
            .map_err(io_error)?;
        zip.write_all(ncx.as_bytes())?;

        // 6. Write nav.xhtml
        let nav = synthesize_nav(&book.chapters, &self.config.nav_title, &book.metadata.language);
        zip.start_file("OEBPS/nav.xhtml", deflated)
            .map_err(io_error)?;
        zip.write_all(nav.as_bytes())?;

        // 7. Write stylesheet
        zip.start_file(format!("OEBPS/{}", STYLESHEET_HREF), deflated)
            .map_err(io_error)?;
        zip.write_all(generate_css(&self.config.style).as_bytes())?;

        // 8. Write cover; it is referenced from the manifest, not the spine
        if let Some(cover) = &self.config.cover {
            zip.start_file(format!("OEBPS/{}", COVER_HREF), deflated)
                .map_err(io_error)?;
            zip.write_all(generate_cover_svg(&book.metadata, cover).as_bytes())?;
        }

        // 9. Write chapters in reading order
        for (i, chapter) in book.chapters.iter().enumerate() {
            let index = i + 1;
            let document = synthesize_chapter(chapter, index, &book.metadata.language);
            zip.start_file(format!("OEBPS/{}", chapter_href(index)), deflated)
                .map_err(io_error)?;
            zip.write_all(document.as_bytes())?;
        }

        zip.finish().map_err(io_error)?;
        Ok(())
    }
}

/// Convert zip error to io error.
fn io_error<E: std::error::Error + Send + Sync + 'static>(e: E) -> io::Error {
    io::Error::other(e)
}

/// Exact content of the `mimetype` entry.
pub const MIMETYPE: &[u8] = b"application/epub+zip";

/// Container.xml template.
const CONTAINER_XML: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

struct ManifestItem {
    id: String,
    href: String,
    media_type: &'static str,
    properties: Option<&'static str>,
}

impl ManifestItem {
    fn new(id: impl Into<String>, href: impl Into<String>, media_type: &'static str) -> Self {
        Self {
            id: id.into(),
            href: href.into(),
            media_type,
            properties: None,
        }
    }

    fn with_properties(mut self, properties: &'static str) -> Self {
        self.properties = Some(properties);
        self
    }
}

/// Generate content.opf from metadata and manifest.
fn generate_opf(metadata: &Metadata, manifest: &[ManifestItem], spine_refs: &[String]) -> String {
    let mut opf = String::new();

    opf.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
"#,
    );
    opf.push_str(&format!(
        "    <dc:identifier id=\"BookId\">{}</dc:identifier>\n",
        escape_xml(&metadata.identifier)
    ));
    opf.push_str(&format!(
        "    <dc:title>{}</dc:title>\n",
        escape_xml(&metadata.title)
    ));
    opf.push_str(&format!(
        "    <dc:creator>{}</dc:creator>\n",
        escape_xml(&metadata.author)
    ));
    opf.push_str(&format!(
        "    <dc:language>{}</dc:language>\n",
        escape_xml(&metadata.language)
    ));
    opf.push_str(&format!(
        "    <meta property=\"dcterms:modified\">{}</meta>\n",
        escape_xml(&metadata.modified)
    ));
    // Cover image meta for EPUB 2 readers
    if manifest.iter().any(|item| item.id == COVER_ID) {
        opf.push_str(&format!("    <meta name=\"cover\" content=\"{COVER_ID}\"/>\n"));
    }
    opf.push_str("  </metadata>\n");

    // Manifest
    opf.push_str("  <manifest>\n");
    for item in manifest {
        opf.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"",
            escape_xml(&item.id),
            escape_xml(&item.href),
            item.media_type
        ));
        if let Some(properties) = item.properties {
            opf.push_str(&format!(" properties=\"{}\"", properties));
        }
        opf.push_str("/>\n");
    }
    opf.push_str("  </manifest>\n");

    // Spine
    opf.push_str("  <spine toc=\"ncx\">\n");
    for id in spine_refs {
        opf.push_str(&format!("    <itemref idref=\"{}\"/>\n", escape_xml(id)));
    }
    opf.push_str("  </spine>\n");

    opf.push_str("</package>\n");
    opf
}

/// Generate toc.ncx with one navPoint per chapter.
fn generate_ncx(metadata: &Metadata, chapters: &[Chapter]) -> String {
    let mut ncx = String::new();

    ncx.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE ncx PUBLIC "-//NISO//DTD ncx 2005-1//EN" "http://www.daisy.org/z3986/2005/ncx-2005-1.dtd">
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content=""#,
    );
    ncx.push_str(&escape_xml(&metadata.identifier));
    ncx.push_str(
        r#""/>
    <meta name="dtb:depth" content="1"/>
    <meta name="dtb:totalPageCount" content="0"/>
    <meta name="dtb:maxPageNumber" content="0"/>
  </head>
  <docTitle>
    <text>"#,
    );
    ncx.push_str(&escape_xml(&metadata.title));
    ncx.push_str(
        r#"</text>
  </docTitle>
  <docAuthor>
    <text>"#,
    );
    ncx.push_str(&escape_xml(&metadata.author));
    ncx.push_str(
        r#"</text>
  </docAuthor>
  <navMap>
"#,
    );

    for (i, chapter) in chapters.iter().enumerate() {
        let play_order = i + 1;
        ncx.push_str(&format!(
            "    <navPoint id=\"navPoint-{}\" playOrder=\"{}\">\n",
            play_order, play_order
        ));
        ncx.push_str(&format!(
            "      <navLabel><text>{}</text></navLabel>\n",
            escape_xml(&chapter.title)
        ));
        ncx.push_str(&format!(
            "      <content src=\"{}\"/>\n",
            chapter_link(play_order)
        ));
        ncx.push_str("    </navPoint>\n");
    }

    ncx.push_str("  </navMap>\n</ncx>\n");
    ncx
}
