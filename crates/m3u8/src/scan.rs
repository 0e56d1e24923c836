//! Line-level helpers shared by the master and media playlist scanners.

use std::str::FromStr;

use crate::{PlaylistError, Result};

/// Split a playlist document into trimmed, non-empty lines.
pub(crate) fn lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Require the `#EXTM3U` header on the first non-empty line.
pub(crate) fn check_header(lines: &[&str]) -> Result<()> {
    match lines.first() {
        Some(first) if first.starts_with("#EXTM3U") => Ok(()),
        _ => Err(PlaylistError::MissingHeader),
    }
}

/// Parse the leading decimal digits of a tag value, zero when there are
/// none.
///
/// `#EXT-X-VERSION` and `#EXT-X-TARGETDURATION` are tolerant of trailing
/// junk, and a non-numeric value degrades to zero instead of failing the
/// document.
pub(crate) fn int_prefix<T: FromStr + Default>(value: &str) -> T {
    let trimmed = value.trim();
    let digits = match trimmed.find(|c: char| !c.is_ascii_digit()) {
        Some(end) => &trimmed[..end],
        None => trimmed,
    };
    digits.parse().unwrap_or_default()
}
