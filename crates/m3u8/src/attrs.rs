//! Attribute list grammar shared by `#EXT-X-STREAM-INF`, `#EXT-X-MEDIA`
//! and `#EXT-X-KEY`.

use std::collections::HashMap;

/// Parse the `KEY=VALUE,KEY2="VALUE,WITH,COMMAS"` list following a tag's
/// colon into a name/value map.
///
/// Attributes are comma separated. A value is either a double-quoted
/// string, which may contain commas and has its quotes stripped, or a bare
/// token running up to the next comma or end of input. An unterminated
/// quote swallows the rest of the input as the value.
///
/// Malformed attributes (no `=` before the next separator) are skipped
/// without aborting the scan. Duplicate keys keep the last occurrence.
pub fn parse_attribute_list(input: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    let mut rest = input;

    while !rest.is_empty() {
        let eq = rest.find('=');
        let comma = rest.find(',');

        let eq = match (eq, comma) {
            // No key/value separator left at all, the tail is junk.
            (None, None) => break,
            // No '=' before the next comma, skip this attribute.
            (None, Some(c)) => {
                rest = &rest[c + 1..];
                continue;
            }
            (Some(e), Some(c)) if c < e => {
                rest = &rest[c + 1..];
                continue;
            }
            (Some(e), _) => e,
        };

        let key = rest[..eq].trim();
        let after = &rest[eq + 1..];

        let (value, next) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(close) => {
                    let tail = &quoted[close + 1..];
                    // Step over anything between the closing quote and the
                    // next separator.
                    let next = match tail.find(',') {
                        Some(c) => &tail[c + 1..],
                        None => "",
                    };
                    (&quoted[..close], next)
                }
                None => (quoted, ""),
            }
        } else {
            match after.find(',') {
                Some(c) => (after[..c].trim(), &after[c + 1..]),
                None => (after.trim(), ""),
            }
        };

        if !key.is_empty() && !value.is_empty() {
            attrs.insert(key.to_string(), value.to_string());
        }
        rest = next;
    }

    attrs
}
