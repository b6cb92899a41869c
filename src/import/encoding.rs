//! Character encoding detection for plain-text sources.
//!
//! Detection runs on a bounded leading sample and walks a fixed ladder:
//!
//! 1. Byte-order mark (UTF-8, UTF-16 LE/BE, UTF-32 LE/BE)
//! 2. Zero-byte parity for BOM-less UTF-16
//! 3. Strict trial decode against a ranked candidate list
//! 4. Statistical guess (`statistical` feature only)
//! 5. Lossy fallback
//!
//! Detection never fails. The fallback step is logged because decoding
//! with it may replace bytes.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use encoding_rs::{BIG5, DecoderResult, Encoding, GB18030, UTF_8, UTF_16BE, UTF_16LE};
use tracing::{debug, warn};

/// Default number of leading bytes inspected by the detector.
pub const DEFAULT_SAMPLE_LEN: usize = 64 * 1024;

/// A text encoding the importer knows how to decode.
///
/// `encoding_rs` implements the WHATWG encodings only, so UTF-32 is
/// handled here directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Standard(&'static Encoding),
    Utf32Le,
    Utf32Be,
}

impl TextEncoding {
    /// Canonical label, e.g. `UTF-8`, `UTF-16LE`, `gb18030`.
    pub fn label(self) -> &'static str {
        match self {
            TextEncoding::Standard(encoding) => encoding.name(),
            TextEncoding::Utf32Le => "UTF-32LE",
            TextEncoding::Utf32Be => "UTF-32BE",
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which rung of the detection ladder produced the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMethod {
    Bom,
    NullBytePattern,
    TrialDecode,
    Statistical,
    Fallback,
}

/// Result of encoding detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub encoding: TextEncoding,
    pub method: DetectionMethod,
}

impl Detection {
    fn new(encoding: TextEncoding, method: DetectionMethod) -> Self {
        Self { encoding, method }
    }
}

/// Detector tuning.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Leading bytes inspected (the rest of the file is only decoded).
    pub sample_len: usize,
    /// Zero-byte ratio one byte lane must exceed to suggest UTF-16.
    pub utf16_high_ratio: f64,
    /// Zero-byte ratio the other lane must stay under.
    pub utf16_low_ratio: f64,
    /// Strict trial-decode order, most specific first.
    pub candidates: Vec<&'static Encoding>,
    /// Encoding used, lossily, when nothing else fits.
    pub fallback: &'static Encoding,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sample_len: DEFAULT_SAMPLE_LEN,
            utf16_high_ratio: 0.30,
            utf16_low_ratio: 0.05,
            // encoding_rs decodes GBK with the GB18030 decoder, so one
            // entry covers both.
            candidates: vec![UTF_8, GB18030, BIG5],
            fallback: GB18030,
        }
    }
}

impl DetectorConfig {
    pub fn with_sample_len(mut self, sample_len: usize) -> Self {
        self.sample_len = sample_len;
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<&'static Encoding>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn with_fallback(mut self, fallback: &'static Encoding) -> Self {
        self.fallback = fallback;
        self
    }
}

/// Detect the encoding of `bytes`.
pub fn detect_encoding(bytes: &[u8], config: &DetectorConfig) -> Detection {
    let sample = &bytes[..bytes.len().min(config.sample_len)];
    let truncated = sample.len() < bytes.len();

    if let Some(encoding) = sniff_bom(sample) {
        return Detection::new(encoding, DetectionMethod::Bom);
    }

    if let Some(encoding) = guess_utf16(sample, config)
        && decodes_strictly(encoding, sample, truncated)
    {
        return Detection::new(
            TextEncoding::Standard(encoding),
            DetectionMethod::NullBytePattern,
        );
    }

    let mut clean = config
        .candidates
        .iter()
        .copied()
        .filter(|&candidate| decodes_strictly(candidate, sample, truncated));
    if let Some(first) = clean.next() {
        let chosen = disambiguate_cjk(first, clean, sample);
        return Detection::new(TextEncoding::Standard(chosen), DetectionMethod::TrialDecode);
    }

    #[cfg(feature = "statistical")]
    if let Some(encoding) = statistical_guess(sample, truncated) {
        return Detection::new(TextEncoding::Standard(encoding), DetectionMethod::Statistical);
    }

    warn!(
        fallback = config.fallback.name(),
        "no candidate encoding decodes cleanly, falling back to lossy decoding"
    );
    Detection::new(TextEncoding::Standard(config.fallback), DetectionMethod::Fallback)
}

/// Recognize a byte-order mark.
///
/// UTF-32LE is checked before UTF-16LE because its BOM starts with the
/// UTF-16LE one.
fn sniff_bom(bytes: &[u8]) -> Option<TextEncoding> {
    if bytes.starts_with(&[0xFF, 0xFE, 0x00, 0x00]) {
        return Some(TextEncoding::Utf32Le);
    }
    if bytes.starts_with(&[0x00, 0x00, 0xFE, 0xFF]) {
        return Some(TextEncoding::Utf32Be);
    }
    Encoding::for_bom(bytes).map(|(encoding, _bom_len)| TextEncoding::Standard(encoding))
}

/// Guess BOM-less UTF-16 from the distribution of zero bytes.
///
/// Only text dominated by codepoints below U+0100 leaves one byte lane
/// mostly zero, so CJK UTF-16 falls through to trial decoding.
fn guess_utf16(sample: &[u8], config: &DetectorConfig) -> Option<&'static Encoding> {
    let units = sample.len() / 2;
    if units < 2 {
        return None;
    }

    let (mut even, mut odd) = (0usize, 0usize);
    for pos in memchr::memchr_iter(0, &sample[..units * 2]) {
        if pos % 2 == 0 {
            even += 1;
        } else {
            odd += 1;
        }
    }

    let even = even as f64 / units as f64;
    let odd = odd as f64 / units as f64;

    if even > config.utf16_high_ratio && odd < config.utf16_low_ratio {
        Some(UTF_16BE)
    } else if odd > config.utf16_high_ratio && even < config.utf16_low_ratio {
        Some(UTF_16LE)
    } else {
        None
    }
}

/// Pick between GB18030 and Big5 when both decode the sample cleanly.
///
/// Almost any Big5 byte stream is also well-formed GB18030, and common
/// simplified text is often well-formed Big5, so rank order alone cannot
/// tell them apart.
fn disambiguate_cjk(
    first: &'static Encoding,
    mut rest: impl Iterator<Item = &'static Encoding>,
    sample: &[u8],
) -> &'static Encoding {
    let other = if first == GB18030 {
        BIG5
    } else if first == BIG5 {
        GB18030
    } else {
        return first;
    };
    if !rest.any(|candidate| candidate == other) {
        return first;
    }
    if looks_like_big5(sample) { BIG5 } else { GB18030 }
}

/// Share of double-byte characters with a trail byte in 0x40..=0x7E.
///
/// GB2312 characters never use that range while roughly a third of the
/// common Big5 characters do.
fn looks_like_big5(sample: &[u8]) -> bool {
    let (mut pairs, mut low_trail) = (0usize, 0usize);
    let mut i = 0;
    while i + 1 < sample.len() {
        let lead = sample[i];
        if lead < 0x80 {
            i += 1;
            continue;
        }
        let trail = sample[i + 1];
        if (0x30..=0x39).contains(&trail) {
            // GB18030 four-byte sequence; Big5 has no such form.
            return false;
        }
        pairs += 1;
        if (0x40..=0x7E).contains(&trail) {
            low_trail += 1;
        }
        i += 2;
    }
    pairs > 0 && low_trail * BIG5_LOW_TRAIL_RATIO_INV >= pairs
}

/// Big5 is assumed once at least one pair in this many has a low trail byte.
const BIG5_LOW_TRAIL_RATIO_INV: usize = 10;

/// Decode `sample` without replacement.
///
/// A truncated sample may end inside a multi-byte sequence; that is not
/// treated as malformed.
fn decodes_strictly(encoding: &'static Encoding, sample: &[u8], truncated: bool) -> bool {
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let Some(capacity) = decoder.max_utf8_buffer_length_without_replacement(sample.len()) else {
        return false;
    };
    let mut out = String::with_capacity(capacity);
    let (result, _read) = decoder.decode_to_string_without_replacement(sample, &mut out, !truncated);
    matches!(result, DecoderResult::InputEmpty)
}

#[cfg(feature = "statistical")]
fn statistical_guess(sample: &[u8], truncated: bool) -> Option<&'static Encoding> {
    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(sample, !truncated);
    let (encoding, confident) = detector.guess_assess(None, true);
    debug!(guess = encoding.name(), confident, "statistical charset guess");
    confident.then_some(encoding)
}

/// Decoded text plus what it took to get there.
#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    pub encoding: TextEncoding,
    /// True if any input was replaced with U+FFFD.
    pub lossy: bool,
}

/// Decode the whole of `bytes` with `encoding`, stripping a leading BOM.
///
/// Malformed sequences become U+FFFD and set [`DecodedText::lossy`].
pub fn decode(bytes: &[u8], encoding: TextEncoding) -> DecodedText {
    let (text, lossy) = match encoding {
        TextEncoding::Standard(encoding) => {
            let (text, lossy) = encoding.decode_with_bom_removal(bytes);
            (text.into_owned(), lossy)
        }
        TextEncoding::Utf32Le => decode_utf32(bytes, false),
        TextEncoding::Utf32Be => decode_utf32(bytes, true),
    };

    DecodedText {
        text,
        encoding,
        lossy,
    }
}

fn decode_utf32(bytes: &[u8], big_endian: bool) -> (String, bool) {
    let mut text = String::with_capacity(bytes.len() / 4);
    let mut lossy = false;

    let mut chunks = bytes.chunks_exact(4);
    for chunk in &mut chunks {
        let raw = [chunk[0], chunk[1], chunk[2], chunk[3]];
        let value = if big_endian {
            u32::from_be_bytes(raw)
        } else {
            u32::from_le_bytes(raw)
        };
        match char::from_u32(value) {
            Some(c) => text.push(c),
            None => {
                text.push(char::REPLACEMENT_CHARACTER);
                lossy = true;
            }
        }
    }
    if !chunks.remainder().is_empty() {
        text.push(char::REPLACEMENT_CHARACTER);
        lossy = true;
    }

    if let Some(stripped) = text.strip_prefix('\u{FEFF}') {
        text = stripped.to_string();
    }
    (text, lossy)
}

/// Detection results memoized by source path.
///
/// Owned by the caller and scoped to one batch run; entries are never
/// invalidated while the cache lives.
#[derive(Debug, Default)]
pub struct EncodingCache {
    entries: HashMap<PathBuf, Detection>,
}

impl EncodingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached detection for `path`, or detect from `bytes`.
    pub fn detect(&mut self, path: &Path, bytes: &[u8], config: &DetectorConfig) -> Detection {
        if let Some(hit) = self.entries.get(path) {
            debug!(path = %path.display(), encoding = %hit.encoding, "encoding cache hit");
            return *hit;
        }
        let detection = detect_encoding(bytes, config);
        self.entries.insert(path.to_path_buf(), detection);
        detection
    }

    pub fn get(&self, path: &Path) -> Option<Detection> {
        self.entries.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
