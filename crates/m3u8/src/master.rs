//! Master playlist parsing: quality variants and alternate renditions.

use std::collections::HashMap;

use crate::Result;
use crate::attrs::parse_attribute_list;
use crate::scan;
use crate::types::{MasterPlaylist, Rendition, RenditionKind, Resolution, Variant};
use crate::url::resolve;

/// Tag signature that distinguishes a master playlist from a media
/// playlist.
pub(crate) const STREAM_INF_SIGNATURE: &str = "#EXT-X-STREAM-INF";

/// Parse master playlist text fetched from `base_url`.
///
/// Fails only when the `#EXTM3U` header is missing. Individually malformed
/// entries are dropped: a variant without a positive `BANDWIDTH`, a
/// rendition missing `TYPE`, `GROUP-ID` or `NAME`, or a stream-info tag
/// whose following line is not a URL.
///
/// Variant and rendition order matches document order.
pub fn parse_master(text: &str, base_url: &str) -> Result<MasterPlaylist> {
    let lines = scan::lines(text);
    scan::check_header(&lines)?;

    let mut playlist = MasterPlaylist::default();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];

        if let Some(value) = line.strip_prefix("#EXT-X-VERSION:") {
            playlist.version = Some(scan::int_prefix(value));
        } else if let Some(value) = line.strip_prefix("#EXT-X-MEDIA:") {
            if let Some(rendition) = parse_rendition(value, base_url) {
                match rendition.kind {
                    RenditionKind::Audio => playlist.audio_renditions.push(rendition),
                    RenditionKind::Subtitles => playlist.subtitle_renditions.push(rendition),
                    // Video renditions duplicate the variant list.
                    RenditionKind::Video => {}
                }
            }
        } else if let Some(value) = line.strip_prefix("#EXT-X-STREAM-INF:") {
            // The variant's URL is the next non-comment line. A tag in that
            // position means the entry is malformed: drop it and let the
            // scan pick the tag up normally on the next iteration.
            if let Some(next) = lines.get(i + 1).filter(|l| !l.starts_with('#')) {
                if let Some(variant) = parse_stream_inf(value, resolve(next, base_url)) {
                    playlist.variants.push(variant);
                }
                i += 1;
            }
        }

        i += 1;
    }

    Ok(playlist)
}

fn parse_stream_inf(attr_list: &str, url: String) -> Option<Variant> {
    let attrs = parse_attribute_list(attr_list);

    let bandwidth = attrs.get("BANDWIDTH").map_or(0, |v| scan::int_prefix(v));
    if bandwidth == 0 {
        return None;
    }

    Some(Variant {
        url,
        bandwidth,
        resolution: attrs.get("RESOLUTION").and_then(|v| Resolution::parse(v)),
        codecs: attrs.get("CODECS").cloned(),
        name: attrs.get("NAME").cloned(),
    })
}

fn parse_rendition(attr_list: &str, base_url: &str) -> Option<Rendition> {
    let attrs = parse_attribute_list(attr_list);

    let kind = RenditionKind::from_attr(attrs.get("TYPE")?)?;

    Some(Rendition {
        kind,
        group_id: attrs.get("GROUP-ID")?.clone(),
        name: attrs.get("NAME")?.clone(),
        language: attrs.get("LANGUAGE").cloned(),
        uri: attrs.get("URI").map(|u| resolve(u, base_url)),
        is_default: yes(&attrs, "DEFAULT"),
        autoselect: yes(&attrs, "AUTOSELECT"),
    })
}

fn yes(attrs: &HashMap<String, String>, key: &str) -> bool {
    attrs.get(key).is_some_and(|v| v == "YES")
}
