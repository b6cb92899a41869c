//! Removal of codepoints that are unsafe in XML or confuse heading detection.

use std::borrow::Cow;

/// Drop control characters, noncharacters and stray byte-order marks.
///
/// Tab, line feed and carriage return are kept. Borrows when the input is
/// already clean.
pub fn sanitize(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_allowed) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.chars().filter(|&c| is_allowed(c)).collect())
    }
}

/// Whether `c` survives sanitizing.
pub fn is_allowed(c: char) -> bool {
    match c {
        '\t' | '\n' | '\r' => true,
        // C0, DEL and C1
        '\u{0}'..='\u{1F}' | '\u{7F}'..='\u{9F}' => false,
        '\u{FEFF}' => false,
        '\u{FDD0}'..='\u{FDEF}' => false,
        // U+xxFFFE and U+xxFFFF in every plane
        c => (c as u32) & 0xFFFE != 0xFFFE,
    }
}
