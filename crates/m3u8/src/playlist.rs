//! Root playlist classification.
//!
//! A fetched document is either a master playlist (variants to pick from)
//! or a media playlist (segments to play). The two grammars share no tag
//! that matters here, so classification is by the stream-info signature.

use crate::Result;
use crate::master::{STREAM_INF_SIGNATURE, parse_master};
use crate::media::parse_media;
use crate::types::{MasterPlaylist, MediaPlaylist};

/// A parsed playlist of either kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Playlist {
    Master(MasterPlaylist),
    Media(MediaPlaylist),
}

/// True when the document declares quality variants, i.e. contains the
/// `#EXT-X-STREAM-INF` signature anywhere.
pub fn is_master(text: &str) -> bool {
    text.contains(STREAM_INF_SIGNATURE)
}

/// Classify `text` by tag signature and parse it with the matching parser.
pub fn parse(text: &str, base_url: &str) -> Result<Playlist> {
    if is_master(text) {
        parse_master(text, base_url).map(Playlist::Master)
    } else {
        parse_media(text, base_url).map(Playlist::Media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlaylistError;

    const BASE: &str = "https://cdn.example.com/live/index.m3u8";

    #[test]
    fn test_classification() {
        assert!(is_master("#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\nv.m3u8\n"));
        assert!(!is_master("#EXTM3U\n#EXTINF:4.0,\nseg.ts\n"));
    }

    #[test]
    fn test_parse_master_document() {
        let text = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1000\nv.m3u8\n";
        match parse(text, BASE).unwrap() {
            Playlist::Master(master) => assert_eq!(master.variants.len(), 1),
            Playlist::Media(_) => panic!("classified as media"),
        }
    }

    #[test]
    fn test_parse_media_document() {
        let text = "#EXTM3U\n#EXTINF:4.0,\nseg.ts\n#EXT-X-ENDLIST\n";
        match parse(text, BASE).unwrap() {
            Playlist::Media(media) => {
                assert_eq!(media.segments.len(), 1);
                assert!(media.end_list);
            }
            Playlist::Master(_) => panic!("classified as master"),
        }
    }

    #[test]
    fn test_header_check_applies_to_both_kinds() {
        assert_eq!(
            parse("#EXT-X-STREAM-INF:BANDWIDTH=1\nv.m3u8\n", BASE),
            Err(PlaylistError::MissingHeader)
        );
        assert_eq!(
            parse("#EXTINF:4.0,\nseg.ts\n", BASE),
            Err(PlaylistError::MissingHeader)
        );
    }
}
