//! Text segmentation into alignable units
//!
//! Splits raw text content into the ordered sequence of units the aligner
//! timestamps. Plain text splits on a client-chosen separator; USFM uses a
//! line-oriented scan that accumulates verse bodies and drops auxiliary
//! markers.

use std::sync::OnceLock;

use regex::Regex;

/// Text format, selected by the text file's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Txt,
    Usfm,
}

impl TextFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "txt" => Some(TextFormat::Txt),
            "usfm" => Some(TextFormat::Usfm),
            _ => None,
        }
    }
}

/// Markers whose lines carry no alignable text (chapter numbers, headings,
/// footnotes, cross references, formatting).
const IGNORED_MARKERS: [&str; 14] = [
    r"\c", r"\p", r"\s", r"\s1", r"\s2", r"\f", r"\ft", r"\fr", r"\x", r"\xt", r"\xo", r"\r",
    r"\t", r"\m",
];

/// Resolve a symbolic separator name to the literal split delimiter.
/// Unrecognized names are used literally.
pub fn resolve_separator(name: &str) -> &str {
    match name {
        "lineBreak" => "\n",
        "squareBracket" => "[",
        "downArrow" => "⬇️",
        other => other,
    }
}

/// Segment text content into ordered alignable units.
///
/// `separator` is the symbolic or literal delimiter for `Txt` content and
/// is ignored for `Usfm`. Units are trimmed but possibly empty; callers
/// must not assume non-empty output.
pub fn segment(content: &str, format: TextFormat, separator: &str) -> Vec<String> {
    match format {
        TextFormat::Txt => segment_txt(content, separator),
        TextFormat::Usfm => segment_usfm(content),
    }
}

fn segment_txt(content: &str, separator: &str) -> Vec<String> {
    let delimiter = resolve_separator(separator);
    if delimiter.is_empty() {
        return vec![content.trim().to_string()];
    }
    content
        .split(delimiter)
        .map(|piece| piece.trim().to_string())
        .collect()
}

fn segment_usfm(content: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut verse = String::new();

    for line in content.lines() {
        let line = line.trim();
        if IGNORED_MARKERS.iter().any(|m| line.starts_with(m)) {
            continue;
        }

        if line.starts_with(r"\v") {
            if !verse.is_empty() {
                units.push(clean_verse(&verse));
            }
            verse = line.to_string();
        } else if !line.is_empty() {
            if !verse.is_empty() {
                verse.push(' ');
            }
            verse.push_str(line);
        }
    }

    if !verse.is_empty() {
        units.push(clean_verse(&verse));
    }

    units
}

/// Strip the leading verse marker (with its verse number) and any remaining
/// `\tag` markup tokens, leaving the bare verse text.
fn clean_verse(verse: &str) -> String {
    static VERSE_PREFIX: OnceLock<Regex> = OnceLock::new();
    static MARKUP: OnceLock<Regex> = OnceLock::new();

    let verse_prefix =
        VERSE_PREFIX.get_or_init(|| Regex::new(r"^\\v\s+\d+\S*\s*").expect("valid regex"));
    let markup = MARKUP.get_or_init(|| Regex::new(r"\\[a-z]+\s?").expect("valid regex"));

    let stripped = verse_prefix.replace(verse.trim(), "");
    markup.replace_all(&stripped, "").trim().to_string()
}
