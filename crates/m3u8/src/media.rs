//! Media playlist parsing: the ordered segment list of one variant.

use std::fmt::Write;

use crate::Result;
use crate::attrs::parse_attribute_list;
use crate::scan;
use crate::types::{EncryptionKey, EncryptionMethod, MediaPlaylist, PlaylistType, Segment};
use crate::url::resolve;

/// Scan-local accumulator for the segment under construction.
///
/// `#EXTINF`, `#EXT-X-KEY` and `#EXT-X-DISCONTINUITY` stage state here and
/// the next non-comment line flushes it into a [`Segment`]. The key is the
/// only field that survives a flush: a declared key stays in effect for
/// every following segment until redeclared.
#[derive(Default)]
struct PendingSegment {
    duration: f64,
    title: Option<String>,
    key: Option<EncryptionKey>,
    discontinuity: bool,
}

impl PendingSegment {
    /// Emit a segment for `url` if a positive duration is staged.
    fn flush(&mut self, url: String) -> Option<Segment> {
        if self.duration <= 0.0 {
            return None;
        }
        let segment = Segment {
            url,
            duration: self.duration,
            title: self.title.take(),
            key: self.key.clone(),
            discontinuity: self.discontinuity,
        };
        self.duration = 0.0;
        self.discontinuity = false;
        Some(segment)
    }
}

/// Parse media playlist text fetched from `base_url`.
///
/// Fails only when the `#EXTM3U` header is missing. Segments are emitted
/// strictly in document order; a URL line is only emitted as a segment when
/// the preceding `#EXTINF` staged a positive duration.
pub fn parse_media(text: &str, base_url: &str) -> Result<MediaPlaylist> {
    let lines = scan::lines(text);
    scan::check_header(&lines)?;

    let mut playlist = MediaPlaylist::default();
    let mut pending = PendingSegment::default();

    for line in lines {
        if let Some(value) = line.strip_prefix("#EXT-X-VERSION:") {
            playlist.version = Some(scan::int_prefix(value));
        } else if let Some(value) = line.strip_prefix("#EXT-X-TARGETDURATION:") {
            playlist.target_duration = scan::int_prefix(value);
        } else if let Some(value) = line.strip_prefix("#EXT-X-PLAYLIST-TYPE:") {
            if let Some(kind) = PlaylistType::from_attr(value) {
                playlist.playlist_type = Some(kind);
            }
        } else if line == "#EXT-X-ENDLIST" {
            playlist.end_list = true;
        } else if line == "#EXT-X-DISCONTINUITY" {
            pending.discontinuity = true;
        } else if let Some(value) = line.strip_prefix("#EXT-X-KEY:") {
            if let Some(key) = parse_key(value, base_url) {
                pending.key = Some(key);
            }
        } else if let Some(value) = line.strip_prefix("#EXTINF:") {
            if let Some((duration, title)) = parse_extinf(value) {
                pending.duration = duration;
                pending.title = title;
            }
        } else if !line.starts_with('#') {
            if let Some(segment) = pending.flush(resolve(line, base_url)) {
                playlist.segments.push(segment);
            }
        }
    }

    Ok(playlist)
}

/// Parse an `#EXT-X-KEY` attribute list into the new sticky key.
///
/// `METHOD=NONE`, or a missing method, turns encryption off from here on
/// and carries no URI or IV. An unrecognized method yields `None` so the
/// previously declared key stays in effect.
fn parse_key(attr_list: &str, base_url: &str) -> Option<EncryptionKey> {
    let attrs = parse_attribute_list(attr_list);

    let method = match attrs.get("METHOD").map(String::as_str) {
        None | Some("NONE") => return Some(EncryptionKey::none()),
        Some("AES-128") => EncryptionMethod::Aes128,
        Some("SAMPLE-AES") => EncryptionMethod::SampleAes,
        Some(_) => return None,
    };

    Some(EncryptionKey {
        method,
        uri: attrs.get("URI").map(|u| resolve(u, base_url)),
        iv: attrs.get("IV").cloned(),
    })
}

/// Extract `(duration, title)` from the value of an `#EXTINF` tag.
///
/// The duration token must be decimal digits and dots; anything else
/// returns `None` so previously staged state stays untouched. An empty
/// title normalizes to `None`.
fn parse_extinf(value: &str) -> Option<(f64, Option<String>)> {
    let (duration, title) = match value.split_once(',') {
        Some((d, t)) => (d, Some(t)),
        None => (value, None),
    };

    let duration = duration.trim();
    if duration.is_empty() || !duration.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let duration = duration.parse().ok()?;

    let title = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    Some((duration, title))
}

impl MediaPlaylist {
    /// Serialize back to playlist text.
    ///
    /// The output is logically equivalent to the parsed input rather than
    /// byte-identical: key tags are written only where the key in effect
    /// changes, and unknown tags from the source are not preserved.
    /// Re-parsing the output yields the same segments.
    pub fn render(&self) -> String {
        let mut out = String::from("#EXTM3U\n");

        if let Some(version) = self.version {
            let _ = writeln!(out, "#EXT-X-VERSION:{version}");
        }
        let _ = writeln!(out, "#EXT-X-TARGETDURATION:{}", self.target_duration);
        if let Some(kind) = self.playlist_type {
            let _ = writeln!(out, "#EXT-X-PLAYLIST-TYPE:{kind}");
        }

        let mut current_key: Option<&EncryptionKey> = None;
        for segment in &self.segments {
            if segment.key.as_ref() != current_key {
                match &segment.key {
                    Some(key) => render_key(&mut out, key),
                    None => out.push_str("#EXT-X-KEY:METHOD=NONE\n"),
                }
                current_key = segment.key.as_ref();
            }
            if segment.discontinuity {
                out.push_str("#EXT-X-DISCONTINUITY\n");
            }
            match &segment.title {
                Some(title) => {
                    let _ = writeln!(out, "#EXTINF:{},{title}", segment.duration);
                }
                None => {
                    let _ = writeln!(out, "#EXTINF:{},", segment.duration);
                }
            }
            let _ = writeln!(out, "{}", segment.url);
        }

        if self.end_list {
            out.push_str("#EXT-X-ENDLIST\n");
        }

        out
    }
}

fn render_key(out: &mut String, key: &EncryptionKey) {
    match key.method {
        EncryptionMethod::None => out.push_str("#EXT-X-KEY:METHOD=NONE\n"),
        method => {
            let _ = write!(out, "#EXT-X-KEY:METHOD={method}");
            if let Some(uri) = &key.uri {
                let _ = write!(out, ",URI=\"{uri}\"");
            }
            if let Some(iv) = &key.iv {
                let _ = write!(out, ",IV={iv}");
            }
            out.push('\n');
        }
    }
}
