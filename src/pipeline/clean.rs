//! Text sanitising: deterministic cleanup of raw OCR output.
//!
//! Tesseract output from a thresholded screenshot is full of stray glyphs:
//! box-drawing characters from slide borders, smart quotes, bullets and
//! line noise. Two rules reduce it to a single line of plain text:
//!
//! 1. Drop every character outside `A-Z a-z 0-9 . , ! ? ( ) - : ;` and space.
//!    Newlines and tabs are outside the set too, so words split across lines
//!    are joined.
//! 2. Collapse whitespace runs to a single space and trim both ends.
//!
//! The result only ever contains whitelisted characters, so applying
//! [`clean_text`] a second time changes nothing.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_NOT_WHITELISTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9.,!?()\-:; ]").unwrap());

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Apply both sanitising rules to raw OCR text.
pub fn clean_text(raw: &str) -> String {
    let s = RE_NOT_WHITELISTED.replace_all(raw, "");
    RE_WHITESPACE.replace_all(&s, " ").trim().to_string()
}

/// Whether `c` survives rule 1.
pub fn is_whitelisted(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | ',' | '!' | '?' | '(' | ')' | '-' | ':' | ';' | ' ')
}
