//! EPUB parsing utilities (OPF, NCX, container.xml)

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::book::Metadata;
use crate::error::{Error, Result};

/// One `<item>` of the package manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

/// Parsed OPF package data.
#[derive(Debug, Clone)]
pub struct OpfData {
    pub metadata: Metadata,
    /// Manifest items in document order.
    pub manifest: Vec<ManifestEntry>,
    /// `idref`s of the spine, in reading order.
    pub spine_ids: Vec<String>,
    /// Manifest id named by `<spine toc="...">`.
    pub toc_id: Option<String>,
    /// Manifest id named by the EPUB 2 `<meta name="cover">`.
    pub cover_id: Option<String>,
}

/// One NCX `navPoint`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavPoint {
    pub title: String,
    pub src: String,
    pub play_order: Option<usize>,
}

/// Parse META-INF/container.xml to find the OPF path.
pub fn parse_container_xml(bytes: &[u8]) -> Result<String> {
    let content = std::str::from_utf8(strip_bom(bytes))
        .map_err(|e| Error::InvalidEpub(format!("container.xml is not UTF-8: {e}")))?;

    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event()? {
            Event::Empty(e) | Event::Start(e) if local_name(e.name().as_ref()) == b"rootfile" => {
                if let Some(path) = attribute(&e, b"full-path") {
                    return Ok(path);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Err(Error::InvalidEpub(
        "no rootfile found in container.xml".to_string(),
    ))
}

/// Parse OPF package document.
pub fn parse_opf(content: &str) -> Result<OpfData> {
    // Text is not trimmed: entity references split titles into several
    // events and the whitespace between them is significant.
    let mut reader = Reader::from_str(content);

    let mut metadata = Metadata {
        title: String::new(),
        author: String::new(),
        language: String::new(),
        identifier: String::new(),
        modified: String::new(),
    };
    let mut manifest = Vec::new();
    let mut spine_ids = Vec::new();
    let mut toc_id = None;
    let mut cover_id = None;

    let mut in_metadata = false;
    let mut current_element: Option<&'static str> = None;
    let mut buf_text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"metadata" => in_metadata = true,
                b"title" if in_metadata => current_element = Some("title"),
                b"creator" if in_metadata => current_element = Some("creator"),
                b"language" if in_metadata => current_element = Some("language"),
                b"identifier" if in_metadata => current_element = Some("identifier"),
                b"meta" if in_metadata
                    && attribute(&e, b"property").as_deref() == Some("dcterms:modified") =>
                {
                    current_element = Some("modified")
                }
                b"spine" => toc_id = attribute(&e, b"toc"),
                _ => {}
            },
            Event::Empty(e) => match local_name(e.name().as_ref()) {
                b"item" => {
                    if let Some(id) = attribute(&e, b"id") {
                        manifest.push(ManifestEntry {
                            id,
                            href: attribute(&e, b"href").unwrap_or_default(),
                            media_type: attribute(&e, b"media-type").unwrap_or_default(),
                            properties: attribute(&e, b"properties"),
                        });
                    }
                }
                b"itemref" => {
                    if let Some(idref) = attribute(&e, b"idref") {
                        spine_ids.push(idref);
                    }
                }
                b"meta" if in_metadata && attribute(&e, b"name").as_deref() == Some("cover") => {
                    cover_id = attribute(&e, b"content");
                }
                _ => {}
            },
            Event::Text(e) => {
                if current_element.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if current_element.is_some() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        buf_text.push(resolved);
                    }
                }
            }
            Event::End(e) => {
                if local_name(e.name().as_ref()) == b"metadata" {
                    in_metadata = false;
                }

                if let Some(elem) = current_element.take() {
                    let text = std::mem::take(&mut buf_text);
                    match elem {
                        "title" => metadata.title = text,
                        "creator" if metadata.author.is_empty() => metadata.author = text,
                        "language" => metadata.language = text,
                        "identifier" if metadata.identifier.is_empty() => {
                            metadata.identifier = text
                        }
                        "modified" => metadata.modified = text,
                        _ => {}
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(OpfData {
        metadata,
        manifest,
        spine_ids,
        toc_id,
        cover_id,
    })
}

/// Parse the navMap of an NCX document (flat).
pub fn parse_ncx(content: &str) -> Result<Vec<NavPoint>> {
    let mut reader = Reader::from_str(content);

    let mut points = Vec::new();
    let mut current: Option<NavPoint> = None;
    let mut in_label = false;
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"navPoint" => {
                    current = Some(NavPoint {
                        title: String::new(),
                        src: String::new(),
                        play_order: attribute(&e, b"playOrder").and_then(|v| v.parse().ok()),
                    })
                }
                b"navLabel" => in_label = true,
                b"text" if in_label => in_text = true,
                _ => {}
            },
            Event::Empty(e) if local_name(e.name().as_ref()) == b"content" => {
                if let Some(point) = current.as_mut() {
                    point.src = attribute(&e, b"src").unwrap_or_default();
                }
            }
            Event::Text(e) if in_text => {
                if let Some(point) = current.as_mut() {
                    point.title.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) if in_text => {
                if let Some(point) = current.as_mut()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    point.title.push(resolved);
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"navPoint" => points.extend(current.take()),
                b"navLabel" => in_label = false,
                b"text" => in_text = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(points)
}

/// Raw (unescaped) value of attribute `key`.
fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

pub fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}

/// Extract local name from namespaced XML name (e.g., "dc:title" -> "title").
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Resolve XML entity references.
fn resolve_entity(entity: &str) -> Option<char> {
    match entity {
        "apos" => return Some('\''),
        "quot" => return Some('"'),
        "lt" => return Some('<'),
        "gt" => return Some('>'),
        "amp" => return Some('&'),
        _ => {}
    }

    if let Some(hex) = entity.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
    } else if let Some(dec) = entity.strip_prefix('#') {
        dec.parse().ok().and_then(char::from_u32)
    } else {
        None
    }
}
