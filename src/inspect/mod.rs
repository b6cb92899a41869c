//! Archive inspection: reads an EPUB back through its container, package
//! document and NCX.

mod parser;
mod reader;

pub use parser::{ManifestEntry, NavPoint, OpfData, parse_container_xml, parse_ncx, parse_opf};
pub use reader::{EpubSummary, inspect_epub, inspect_epub_from_reader};
