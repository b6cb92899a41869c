//! Chapter segmentation of plain text.
//!
//! Each line is classified on its own as either a chapter heading or body
//! text; there is no look-ahead. A heading always starts a new chapter,
//! even when that leaves the previous one nearly empty.

use std::sync::LazyLock;

use regex::Regex;

use crate::book::{BODY_TITLE, Chapter, PREFACE_TITLE};

/// Longest line (in characters) that can still be a heading.
pub const MAX_HEADING_CHARS: usize = 50;

/// `第十二章`, `第1章`, `第三卷 第五章`, `第十二之一节`, or a bare `第二卷` marker.
static CJK_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    let n = "[0-9０-９一二三四五六七八九十百千万零〇两]+";
    Regex::new(&format!(
        r"^(?:第{n}[卷部篇季集]\s*)?第{n}(?:[之\-－]{n})?[章节節回篇集卷部季]"
    ))
    .unwrap()
});

/// `Chapter 12`, `Part IV`, `Book 2: ...`
static LATIN_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:chapter|part|book|volume)\s*(?:[0-9]+|\s[ivxlcdm]+)\b").unwrap()
});

/// Short numbered labels: `12.标题`, `12、标题`, `三、标题`, `12 标题`.
static NUMBERED_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[0-9０-９]{1,4}|[一二三四五六七八九十百千零〇两]{1,6})(?:[.．、:：]|\s)\s*\S")
        .unwrap()
});

/// `本书完`, `本卷完（下卷待续）`
static END_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^本[书書集篇卷季]?完").unwrap());

/// Stand-alone section markers, compared after normalization.
const SPECIAL_MARKERS: &[&str] = &[
    "序", "序言", "序章", "前言", "楔子", "引子", "引言", "尾声", "后记", "番外", "终章",
    "完本感言", "preface", "prologue", "epilogue", "afterword", "introduction",
];

/// Segmenter tuning.
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    pub max_heading_chars: usize,
    /// Title for content before the first heading.
    pub preface_title: String,
    /// Title for a document with no heading at all.
    pub body_title: String,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_heading_chars: MAX_HEADING_CHARS,
            preface_title: PREFACE_TITLE.to_string(),
            body_title: BODY_TITLE.to_string(),
        }
    }
}

impl SegmenterConfig {
    pub fn with_max_heading_chars(mut self, max: usize) -> Self {
        self.max_heading_chars = max;
        self
    }

    /// Whether `line` opens a new chapter.
    pub fn is_heading(&self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() || line.chars().count() > self.max_heading_chars {
            return false;
        }

        CJK_HEADING_RE.is_match(line)
            || LATIN_HEADING_RE.is_match(line)
            || NUMBERED_LABEL_RE.is_match(line)
            || END_MARKER_RE.is_match(line)
            || is_special_marker(line)
    }
}

/// Classify `line` with the default configuration.
pub fn is_chapter_heading(line: &str) -> bool {
    SegmenterConfig::default().is_heading(line)
}

fn is_special_marker(line: &str) -> bool {
    let normalized: String = line
        .chars()
        .filter(|&c| !c.is_whitespace() && !is_punctuation(c))
        .flat_map(char::to_lowercase)
        .collect();
    SPECIAL_MARKERS.contains(&normalized.as_str())
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(
            c,
            '、' | '，'
                | '。'
                | '：'
                | '；'
                | '！'
                | '？'
                | '·'
                | '…'
                | '—'
                | '（'
                | '）'
                | '【'
                | '】'
                | '《'
                | '》'
                | '「'
                | '」'
                | '『'
                | '』'
                | '〔'
                | '〕'
        )
}

/// Split `text` into chapters. Always returns at least one chapter.
pub fn segment(text: &str, config: &SegmenterConfig) -> Vec<Chapter> {
    segment_lines(text.lines(), config)
}

/// Split a sequence of lines into chapters.
///
/// Body lines keep their leading whitespace; trailing whitespace is
/// removed. Blank lines stay in the body (the renderer drops them).
pub fn segment_lines<'a, I>(lines: I, config: &SegmenterConfig) -> Vec<Chapter>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut chapters = Vec::new();
    let mut title: Option<String> = None;
    let mut body: Vec<String> = Vec::new();

    for raw in lines {
        let line = raw.trim_end();
        if config.is_heading(line) {
            close_chapter(
                &mut chapters,
                title.take(),
                std::mem::take(&mut body),
                &config.preface_title,
            );
            title = Some(line.trim().to_string());
        } else {
            body.push(line.to_string());
        }
    }
    close_chapter(&mut chapters, title, body, &config.body_title);

    if chapters.is_empty() {
        chapters.push(Chapter::new(config.body_title.clone()));
    }
    chapters
}

/// Push the pending pair. An untitled pair is kept only if it has lines.
fn close_chapter(
    chapters: &mut Vec<Chapter>,
    title: Option<String>,
    body: Vec<String>,
    default_title: &str,
) {
    match title {
        Some(title) => chapters.push(Chapter { title, body }),
        None if !body.is_empty() => chapters.push(Chapter {
            title: default_title.to_string(),
            body,
        }),
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles(chapters: &[Chapter]) -> Vec<&str> {
        chapters.iter().map(|c| c.title.as_str()).collect()
    }

    #[test]
    fn test_cjk_headings() {
        assert!(is_chapter_heading("第一章 开始"));
        assert!(is_chapter_heading("第1章"));
        assert!(is_chapter_heading("  第十二章　风起云涌  "));
        assert!(is_chapter_heading("第三百二十一回 大结局"));
        assert!(is_chapter_heading("第２节"));
        assert!(is_chapter_heading("第一卷 第三章 初入江湖"));
        assert!(is_chapter_heading("第二卷"));
        assert!(is_chapter_heading("第十二之一章 插曲"));
    }

    #[test]
    fn test_latin_headings() {
        assert!(is_chapter_heading("Chapter 1"));
        assert!(is_chapter_heading("CHAPTER 12: The Storm"));
        assert!(is_chapter_heading("Part IV"));
        assert!(is_chapter_heading("Book 2"));
        assert!(!is_chapter_heading("Book isn't finished"));
    }

    #[test]
    fn test_numbered_labels() {
        assert!(is_chapter_heading("12.重逢"));
        assert!(is_chapter_heading("12. Reunion"));
        assert!(is_chapter_heading("三、离别"));
        assert!(is_chapter_heading("7 意外"));
        assert!(!is_chapter_heading("12."));
        assert!(!is_chapter_heading("2024年春天"));
    }

    #[test]
    fn test_special_markers() {
        assert!(is_chapter_heading("楔子"));
        assert!(is_chapter_heading("【序言】"));
        assert!(is_chapter_heading("尾 声"));
        assert!(is_chapter_heading("Prologue"));
        assert!(is_chapter_heading("- EPILOGUE -"));
        assert!(is_chapter_heading("本书完"));
        assert!(is_chapter_heading("本卷完（下卷待续）"));
        assert!(!is_chapter_heading("楔子之后的故事还很长"));
    }

    #[test]
    fn test_prose_is_not_a_heading() {
        assert!(!is_chapter_heading(""));
        assert!(!is_chapter_heading("   "));
        assert!(!is_chapter_heading("今天天气很好。"));
        assert!(!is_chapter_heading("第二天早上，他出门了。"));
        assert!(!is_chapter_heading("他说：“第一章还没写完。”"));
    }

    #[test]
    fn test_long_lines_are_never_headings() {
        let long = format!("第一章 {}", "很长".repeat(30));
        assert!(!is_chapter_heading(&long));

        let config = SegmenterConfig::default().with_max_heading_chars(200);
        assert!(config.is_heading(&long));
    }

    #[test]
    fn test_two_chapter_scenario() {
        let text = "第一章 开始\n今天天气很好。\n第二章 结束\n故事说完了。\n";
        let chapters = segment(text, &SegmenterConfig::default());
        assert_eq!(
            chapters,
            vec![
                Chapter::new("第一章 开始").with_line("今天天气很好。"),
                Chapter::new("第二章 结束").with_line("故事说完了。"),
            ]
        );
    }

    #[test]
    fn test_empty_document_yields_one_body_chapter() {
        let chapters = segment("", &SegmenterConfig::default());
        assert_eq!(chapters, vec![Chapter::new(BODY_TITLE)]);
    }

    #[test]
    fn test_no_headings_yields_single_body_chapter() {
        let chapters = segment("一段文字。\n另一段。\n", &SegmenterConfig::default());
        assert_eq!(titles(&chapters), vec![BODY_TITLE]);
        assert_eq!(chapters[0].body, vec!["一段文字。", "另一段。"]);
    }

    #[test]
    fn test_leading_text_becomes_preface() {
        let text = "作者：张三\n简介\n第一章 开始\n正文\n";
        let chapters = segment(text, &SegmenterConfig::default());
        assert_eq!(titles(&chapters), vec![PREFACE_TITLE, "第一章 开始"]);
        assert_eq!(chapters[0].body, vec!["作者：张三", "简介"]);
    }

    #[test]
    fn test_leading_blank_lines_make_a_blank_preface() {
        let text = "\n  \n第一章 开始\n正文\n";
        let chapters = segment(text, &SegmenterConfig::default());
        assert_eq!(titles(&chapters), vec![PREFACE_TITLE, "第一章 开始"]);
        assert_eq!(chapters[0].body, vec!["", ""]);
        assert!(chapters[0].is_blank());
        assert!(!chapters[1].is_blank());
    }

    #[test]
    fn test_heading_on_first_line_has_no_preface() {
        let chapters = segment("第一章 开始\n正文\n", &SegmenterConfig::default());
        assert_eq!(titles(&chapters), vec!["第一章 开始"]);
    }

    #[test]
    fn test_blank_only_text_is_one_body_chapter() {
        let chapters = segment("\n \n", &SegmenterConfig::default());
        assert_eq!(titles(&chapters), vec![BODY_TITLE]);
        assert!(chapters[0].is_blank());
    }

    #[test]
    fn test_consecutive_headings_keep_empty_chapters() {
        let text = "第一卷\n第一章 开始\n内容\n";
        let chapters = segment(text, &SegmenterConfig::default());
        assert_eq!(titles(&chapters), vec!["第一卷", "第一章 开始"]);
        assert!(chapters[0].body.is_empty());
    }

    #[test]
    fn test_trailing_heading_closes_with_empty_body() {
        let chapters = segment("第一章\n内容\n本书完", &SegmenterConfig::default());
        assert_eq!(titles(&chapters), vec!["第一章", "本书完"]);
        assert!(chapters[1].body.is_empty());
    }

    #[test]
    fn test_body_keeps_indentation_and_crlf_is_stripped() {
        let chapters = segment("第一章\r\n　　他来了。  \r\n", &SegmenterConfig::default());
        assert_eq!(chapters[0].body, vec!["　　他来了。"]);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        /// Lines that are either chapter headings or plain prose.
        fn line() -> impl Strategy<Value = String> {
            prop_oneof![
                (1u32..500).prop_map(|n| format!("第{n}章 标题")),
                "[a-z一二三天地人 ，。]{0,20}",
            ]
        }

        proptest! {
            #[test]
            fn prop_at_least_one_chapter(text in "\\PC{0,200}") {
                prop_assert!(!segment(&text, &SegmenterConfig::default()).is_empty());
            }

            #[test]
            fn prop_headings_appear_in_source_order(lines in prop::collection::vec(line(), 0..40)) {
                let text = lines.join("\n");
                let config = SegmenterConfig::default();
                let expected: Vec<&str> = lines
                    .iter()
                    .map(|l| l.trim())
                    .filter(|l| config.is_heading(l))
                    .collect();

                let chapters = segment(&text, &config);
                let found: Vec<&str> = chapters
                    .iter()
                    .map(|c| c.title.as_str())
                    .filter(|t| *t != PREFACE_TITLE && *t != BODY_TITLE)
                    .collect();
                prop_assert_eq!(found, expected);
            }

            #[test]
            fn prop_no_chapter_title_is_empty(text in "\\PC{0,200}") {
                for chapter in segment(&text, &SegmenterConfig::default()) {
                    prop_assert!(!chapter.title.is_empty());
                }
            }
        }
    }
}
