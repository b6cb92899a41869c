//! XHTML synthesis for chapter and navigation documents.
//!
//! Every chapter gets its own complete XHTML document. All text passes
//! through [`escape_xml`] exactly once, at the point it is written.
//!
//! # Example
//!
//! ```
//! use txtpub::Chapter;
//! use txtpub::export::synthesize_chapter;
//!
//! let chapter = Chapter::new("第一章").with_line("a < b");
//! let doc = synthesize_chapter(&chapter, 1, "zh");
//!
//! assert!(doc.contains(r#"<h2 id="chapter1">第一章</h2>"#));
//! assert!(doc.contains("<p>a &lt; b</p>"));
//! ```

use crate::book::Chapter;

/// Href of the shared stylesheet, relative to the content documents.
pub const STYLESHEET_HREF: &str = "style.css";

/// Manifest id and heading anchor of the chapter at 1-based `index`.
pub fn chapter_id(index: usize) -> String {
    format!("chapter{}", index)
}

/// File name of the chapter at 1-based `index`.
pub fn chapter_href(index: usize) -> String {
    format!("chapter{}.xhtml", index)
}

/// Link to the heading of the chapter at 1-based `index`.
pub fn chapter_link(index: usize) -> String {
    format!("{}#{}", chapter_href(index), chapter_id(index))
}

/// Render one chapter as a standalone XHTML document.
///
/// Blank body lines are dropped; every other line becomes a trimmed `<p>`.
pub fn synthesize_chapter(chapter: &Chapter, index: usize, language: &str) -> String {
    let mut doc = String::with_capacity(
        256 + chapter.body.iter().map(|line| line.len() + 12).sum::<usize>(),
    );

    push_head(&mut doc, &chapter.title, language);
    doc.push_str(&format!(
        "  <h2 id=\"{}\">{}</h2>\n",
        chapter_id(index),
        escape_xml(&chapter.title)
    ));

    for line in &chapter.body {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        doc.push_str("  <p>");
        doc.push_str(&escape_xml(text));
        doc.push_str("</p>\n");
    }

    doc.push_str("</body>\n</html>\n");
    doc
}

/// Render the EPUB 3 navigation document.
pub fn synthesize_nav(chapters: &[Chapter], nav_title: &str, language: &str) -> String {
    let mut doc = String::new();

    push_head(&mut doc, nav_title, language);
    doc.push_str("  <nav epub:type=\"toc\" id=\"toc\">\n");
    doc.push_str(&format!("    <h1>{}</h1>\n", escape_xml(nav_title)));
    doc.push_str("    <ol>\n");
    for (i, chapter) in chapters.iter().enumerate() {
        let index = i + 1;
        doc.push_str(&format!(
            "      <li><a href=\"{}\">{}</a></li>\n",
            chapter_link(index),
            escape_xml(&chapter.title)
        ));
    }
    doc.push_str("    </ol>\n  </nav>\n");
    doc.push_str("</body>\n</html>\n");
    doc
}

/// XML declaration through the opening `<body>` tag.
fn push_head(doc: &mut String, title: &str, language: &str) {
    let lang = escape_xml(language);
    doc.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE html>\n");
    doc.push_str(&format!(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\" xml:lang=\"{lang}\" lang=\"{lang}\">\n"
    ));
    doc.push_str("<head>\n  <meta charset=\"utf-8\"/>\n");
    doc.push_str(&format!("  <title>{}</title>\n", escape_xml(title)));
    doc.push_str(&format!(
        "  <link rel=\"stylesheet\" type=\"text/css\" href=\"{}\"/>\n",
        STYLESHEET_HREF
    ));
    doc.push_str("</head>\n<body>\n");
}

/// Escape the five XML predefined entities.
pub fn escape_xml(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&apos;"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    use quick_xml::Reader;
    use quick_xml::events::Event;

    fn assert_well_formed(doc: &str) {
        let mut reader = Reader::from_str(doc);
        loop {
            match reader.read_event() {
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => panic!("not well-formed: {e}\n{doc}"),
            }
        }
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("Hello & World"), "Hello &amp; World");
        assert_eq!(escape_xml("<tag>"), "&lt;tag&gt;");
        assert_eq!(escape_xml("\"quoted\" 'single'"), "&quot;quoted&quot; &apos;single&apos;");
        assert_eq!(escape_xml("汉字"), "汉字");
    }

    #[test]
    fn test_chapter_escapes_body_and_title() {
        let chapter = Chapter::new("A & B").with_line("if a < b && b > c");
        let doc = synthesize_chapter(&chapter, 3, "zh");

        assert!(doc.contains("<title>A &amp; B</title>"));
        assert!(doc.contains(r#"<h2 id="chapter3">A &amp; B</h2>"#));
        assert!(doc.contains("<p>if a &lt; b &amp;&amp; b &gt; c</p>"));
        assert_well_formed(&doc);
    }

    #[test]
    fn test_chapter_drops_blank_lines() {
        let chapter = Chapter::new("t")
            .with_line("　　第一段。")
            .with_line("")
            .with_line("   ")
            .with_line("第二段。");
        let doc = synthesize_chapter(&chapter, 1, "zh");

        assert_eq!(doc.matches("<p>").count(), 2);
        assert!(doc.contains("<p>第一段。</p>"));
        assert!(!doc.contains("<p></p>"));
    }

    #[test]
    fn test_chapter_links_stylesheet_and_language() {
        let doc = synthesize_chapter(&Chapter::new("t"), 1, "zh-CN");
        assert!(doc.contains(r#"href="style.css""#));
        assert!(doc.contains(r#"xml:lang="zh-CN""#));
        assert_well_formed(&doc);
    }

    #[test]
    fn test_nav_lists_chapters_in_order() {
        let chapters = vec![Chapter::new("一"), Chapter::new("<二>"), Chapter::new("三")];
        let nav = synthesize_nav(&chapters, "目录", "zh");

        let first = nav.find("chapter1.xhtml#chapter1").unwrap();
        let second = nav.find("chapter2.xhtml#chapter2").unwrap();
        let third = nav.find("chapter3.xhtml#chapter3").unwrap();
        assert!(first < second && second < third);
        assert!(nav.contains("&lt;二&gt;"));
        assert!(nav.contains(r#"epub:type="toc""#));
        assert_well_formed(&nav);
    }

    #[test]
    fn test_chapter_helpers() {
        assert_eq!(chapter_id(7), "chapter7");
        assert_eq!(chapter_href(7), "chapter7.xhtml");
        assert_eq!(chapter_link(7), "chapter7.xhtml#chapter7");
    }
}
