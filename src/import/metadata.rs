//! Author and title discovery from file names and leading lines.

use std::sync::LazyLock;

use regex::Regex;

/// Number of leading lines searched for an author declaration.
pub const AUTHOR_SCAN_LINES: usize = 20;

/// `作者：张三`, `Author: Jane Doe`
static AUTHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:作者|著者|author|written\s+by)\s*[:：]\s*(\S.*?)\s*$").unwrap()
});

/// `《书名》作者`
static BRACKETED_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^《(.+?)》(.*)$").unwrap());

/// Search the first [`AUTHOR_SCAN_LINES`] lines for an author declaration.
pub fn detect_author<'a, I>(lines: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .take(AUTHOR_SCAN_LINES)
        .find_map(|line| AUTHOR_RE.captures(line))
        .map(|caps| caps[1].to_string())
}

/// Title and author encoded in a file stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNameInfo {
    pub title: String,
    pub author: Option<String>,
}

/// Parse the `《title》author` naming convention; any other stem is the title.
pub fn parse_file_name(stem: &str) -> FileNameInfo {
    let stem = stem.trim();
    match BRACKETED_NAME_RE.captures(stem) {
        Some(caps) => {
            let author = caps[2].trim();
            FileNameInfo {
                title: caps[1].trim().to_string(),
                author: (!author.is_empty()).then(|| author.to_string()),
            }
        }
        None => FileNameInfo {
            title: stem.to_string(),
            author: None,
        },
    }
}
