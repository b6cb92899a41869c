//! Generated cover image.
//!
//! A plain SVG page: title centred slightly above the middle, author
//! underneath. Long titles wrap by estimated glyph width.

use crate::book::Metadata;

use super::xhtml::escape_xml;

/// Archive path of the cover, relative to the package document.
pub const COVER_HREF: &str = "cover.svg";

/// Manifest id of the cover image.
pub const COVER_ID: &str = "cover-image";

pub const COVER_MEDIA_TYPE: &str = "image/svg+xml";

/// Title lines beyond this are cut and marked with an ellipsis.
const MAX_TITLE_LINES: usize = 5;

/// Share of the page width text may use.
const TEXT_WIDTH_RATIO: f32 = 0.85;

/// Layout of the generated cover.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverConfig {
    pub width: u32,
    pub height: u32,
    pub background: String,
    pub foreground: String,
    /// Title font size in pixels.
    pub title_size: u32,
    /// Author font size in pixels.
    pub author_size: u32,
    pub font_family: String,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 1200,
            background: "#ffffff".to_string(),
            foreground: "#000000".to_string(),
            title_size: 60,
            author_size: 40,
            font_family: "serif".to_string(),
        }
    }
}

/// Render the cover for `metadata`.
pub fn generate_cover_svg(metadata: &Metadata, config: &CoverConfig) -> String {
    let width = config.width as f32;
    let height = config.height as f32;
    let title_size = config.title_size as f32;
    let author_size = config.author_size as f32;
    let max_em = width * TEXT_WIDTH_RATIO;

    let title_lines = wrap(&metadata.title, max_em / title_size);
    let line_height = title_size * 1.2;
    let block_height = line_height * title_lines.len() as f32;
    let top = (height - block_height) / 2.0 - 50.0;
    let center = width / 2.0;

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">
  <rect width="{w}" height="{h}" fill="{bg}"/>
"#,
        w = config.width,
        h = config.height,
        bg = escape_xml(&config.background),
    ));

    for (i, line) in title_lines.iter().enumerate() {
        // Baselines: one font size below the top of each line box.
        let y = top + line_height * i as f32 + title_size;
        push_text(&mut svg, line, center, y, config.title_size, config);
    }

    let author_y = top + block_height + 20.0 + author_size;
    push_text(&mut svg, &metadata.author, center, author_y, config.author_size, config);

    svg.push_str("</svg>\n");
    svg
}

fn push_text(svg: &mut String, text: &str, x: f32, y: f32, size: u32, config: &CoverConfig) {
    svg.push_str(&format!(
        "  <text x=\"{x:.0}\" y=\"{y:.0}\" font-size=\"{size}\" font-family=\"{}\" \
         text-anchor=\"middle\" fill=\"{}\">{}</text>\n",
        escape_xml(&config.font_family),
        escape_xml(&config.foreground),
        escape_xml(text),
    ));
}

/// Estimated advance of `c` in ems. CJK and other wide glyphs are square.
fn char_width(c: char) -> f32 {
    if c.is_ascii() { 0.55 } else { 1.0 }
}

/// Greedy wrap of `text` into lines at most `max_em` wide.
fn wrap(text: &str, max_em: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_em = 0.0;

    for c in text.trim().chars() {
        let w = char_width(c);
        if current_em + w > max_em && !current.is_empty() {
            lines.push(std::mem::take(&mut current).trim_end().to_string());
            current_em = 0.0;
            if c.is_whitespace() {
                continue;
            }
        }
        current.push(c);
        current_em += w;
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }

    if lines.len() > MAX_TITLE_LINES {
        lines.truncate(MAX_TITLE_LINES);
        if let Some(last) = lines.last_mut() {
            last.pop();
            last.push('…');
        }
    }
    lines
}
