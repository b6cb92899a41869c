//! Stylesheet generation.
//!
//! Output is a single small stylesheet shared by every chapter: a font
//! stack, line height, centered headings and indented paragraphs.

/// Readability settings for the generated stylesheet.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleConfig {
    /// CSS `font-family` value.
    pub font_family: String,
    pub line_height: f32,
    /// First-line paragraph indent, in `em`.
    pub text_indent_em: f32,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            font_family: "SimSun, \"Songti SC\", serif".to_string(),
            line_height: 1.5,
            text_indent_em: 2.0,
        }
    }
}

/// Generate `style.css`.
pub fn generate_css(style: &StyleConfig) -> String {
    let mut css = String::new();
    css.push_str(&format!(
        "body {{ font-family: {}; line-height: {}; margin: 0 0.5em; }}\n",
        style.font_family, style.line_height
    ));
    css.push_str("h1, h2 { text-align: center; margin: 1em 0; }\n");
    css.push_str(&format!(
        "p {{ text-indent: {}em; margin: 0.5em 0; }}\n",
        style.text_indent_em
    ));
    css.push_str("nav ol { list-style-type: none; padding-left: 0; }\n");
    css
}
