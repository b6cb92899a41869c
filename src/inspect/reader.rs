use std::io::{Read, Seek};
use std::path::Path;

use zip::{CompressionMethod, ZipArchive};

use crate::book::Metadata;
use crate::error::{Error, Result};

use super::parser::{ManifestEntry, NavPoint, parse_container_xml, parse_ncx, parse_opf};

/// What an EPUB archive declares about itself.
#[derive(Debug, Clone)]
pub struct EpubSummary {
    pub metadata: Metadata,
    /// Path of the package document inside the archive.
    pub opf_path: String,
    pub manifest: Vec<ManifestEntry>,
    /// Spine `idref`s in reading order.
    pub spine: Vec<String>,
    /// NCX entries, empty if the book has no NCX.
    pub toc: Vec<NavPoint>,
    /// Manifest href of the cover image, if one is declared.
    pub cover_href: Option<String>,
}

impl EpubSummary {
    /// Manifest hrefs of the spine items, in reading order.
    pub fn spine_hrefs(&self) -> Vec<&str> {
        self.spine
            .iter()
            .filter_map(|idref| self.manifest_item(idref))
            .map(|item| item.href.as_str())
            .collect()
    }

    pub fn manifest_item(&self, id: &str) -> Option<&ManifestEntry> {
        self.manifest.iter().find(|item| item.id == id)
    }
}

/// Inspect an EPUB file on disk.
///
/// # Example
///
/// ```no_run
/// use txtpub::inspect_epub;
///
/// let summary = inspect_epub("book.epub")?;
/// println!("Title: {}", summary.metadata.title);
/// println!("Chapters: {}", summary.spine.len());
/// # Ok::<(), txtpub::Error>(())
/// ```
pub fn inspect_epub<P: AsRef<Path>>(path: P) -> Result<EpubSummary> {
    let file = std::fs::File::open(path)?;
    inspect_epub_from_reader(file)
}

/// Inspect an EPUB from any [`Read`] + [`Seek`] source.
///
/// Fails unless the first entry is an uncompressed `mimetype` holding
/// `application/epub+zip`.
pub fn inspect_epub_from_reader<R: Read + Seek>(reader: R) -> Result<EpubSummary> {
    let mut archive = ZipArchive::new(reader)?;

    check_mimetype(&mut archive)?;

    let container = read_archive_file_bytes(&mut archive, "META-INF/container.xml")?;
    let opf_path = parse_container_xml(&container)?;
    let opf_dir = Path::new(&opf_path)
        .parent()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default();

    let opf = read_archive_file(&mut archive, &opf_path)?;
    let data = parse_opf(&opf)?;

    let ncx_href = data
        .toc_id
        .as_deref()
        .and_then(|id| data.manifest.iter().find(|item| item.id == id))
        .map(|item| resolve_path(&opf_dir, &item.href));
    let toc = match ncx_href {
        Some(href) => parse_ncx(&read_archive_file(&mut archive, &href)?)?,
        None => Vec::new(),
    };

    let cover_href = find_cover(&data.manifest, data.cover_id.as_deref());

    Ok(EpubSummary {
        metadata: data.metadata,
        opf_path,
        manifest: data.manifest,
        spine: data.spine_ids,
        toc,
        cover_href,
    })
}

/// The EPUB 3 `cover-image` property wins over the EPUB 2 cover meta.
fn find_cover(manifest: &[ManifestEntry], cover_id: Option<&str>) -> Option<String> {
    let epub3 = manifest.iter().find(|item| {
        item.properties
            .as_ref()
            .is_some_and(|props| props.split_ascii_whitespace().any(|p| p == "cover-image"))
    });
    epub3
        .or_else(|| cover_id.and_then(|id| manifest.iter().find(|item| item.id == id)))
        .map(|item| item.href.clone())
}

fn check_mimetype<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<()> {
    if archive.len() == 0 {
        return Err(Error::InvalidEpub("archive is empty".to_string()));
    }

    let mut first = archive.by_index(0)?;
    if first.name() != "mimetype" {
        return Err(Error::InvalidEpub(format!(
            "first entry is {:?}, expected \"mimetype\"",
            first.name()
        )));
    }
    if first.compression() != CompressionMethod::Stored {
        return Err(Error::InvalidEpub("mimetype entry is compressed".to_string()));
    }

    let mut content = Vec::new();
    first.read_to_end(&mut content)?;
    if content != crate::export::MIMETYPE {
        return Err(Error::InvalidEpub(format!(
            "unexpected mimetype {:?}",
            String::from_utf8_lossy(&content)
        )));
    }
    Ok(())
}

/// Read a file from the archive as UTF-8 text.
fn read_archive_file<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String> {
    let bytes = read_archive_file_bytes(archive, path)?;
    String::from_utf8(bytes)
        .map_err(|e| Error::InvalidEpub(format!("{path} is not UTF-8: {e}")))
}

/// Read a file from the archive as bytes.
fn read_archive_file_bytes<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<Vec<u8>> {
    let mut file = archive.by_name(path)?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    Ok(contents)
}

/// Resolve a relative path against a base directory.
fn resolve_path(base: &str, href: &str) -> String {
    if base.is_empty() {
        href.to_string()
    } else {
        format!("{}/{}", base, href)
    }
}
