use std::fmt;

/// Declared pixel dimensions of a variant, from the `RESOLUTION` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Parse a `WxH` attribute value. Returns `None` for anything malformed.
    pub fn parse(value: &str) -> Option<Self> {
        let (w, h) = value.split_once('x')?;
        Some(Self {
            width: w.trim().parse().ok()?,
            height: h.trim().parse().ok()?,
        })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One encoded rendition of a title at a given quality, from
/// `#EXT-X-STREAM-INF`
///
/// Duplicates are preserved in arrival order; the parser never deduplicates.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    /// Absolute URL of the variant's media playlist
    pub url: String,
    /// Peak bandwidth in bits per second; always positive (variants without
    /// a positive `BANDWIDTH` are dropped during parsing)
    pub bandwidth: u64,
    pub resolution: Option<Resolution>,
    pub codecs: Option<String>,
    pub name: Option<String>,
}

/// Alternate track category from the `TYPE` attribute of `#EXT-X-MEDIA`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenditionKind {
    Audio,
    Subtitles,
    Video,
}

impl RenditionKind {
    pub(crate) fn from_attr(value: &str) -> Option<Self> {
        match value {
            "AUDIO" => Some(Self::Audio),
            "SUBTITLES" => Some(Self::Subtitles),
            "VIDEO" => Some(Self::Video),
            _ => None,
        }
    }
}

/// An alternate audio or subtitle track declared in a master playlist
#[derive(Debug, Clone, PartialEq)]
pub struct Rendition {
    pub kind: RenditionKind,
    pub group_id: String,
    pub name: String,
    pub language: Option<String>,
    /// Absolute URL of the rendition's media playlist, when declared
    pub uri: Option<String>,
    pub is_default: bool,
    pub autoselect: bool,
}

/// A parsed master playlist: the set of variants plus alternate renditions
///
/// Order matches document order for variants and for each rendition
/// category independently.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MasterPlaylist {
    pub version: Option<u32>,
    pub variants: Vec<Variant>,
    pub audio_renditions: Vec<Rendition>,
    pub subtitle_renditions: Vec<Rendition>,
}

/// Encryption scheme of a segment key, from the `METHOD` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptionMethod {
    Aes128,
    SampleAes,
    #[default]
    None,
}

impl fmt::Display for EncryptionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aes128 => f.write_str("AES-128"),
            Self::SampleAes => f.write_str("SAMPLE-AES"),
            Self::None => f.write_str("NONE"),
        }
    }
}

/// A segment decryption key declared by `#EXT-X-KEY`
///
/// A key stays in effect for every following segment until redeclared. A
/// `NONE` key carries no URI or IV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionKey {
    pub method: EncryptionMethod,
    /// Absolute URL of the key resource
    pub uri: Option<String>,
    /// Initialization vector, verbatim from the playlist (hex string,
    /// `0x` prefix preserved when present)
    pub iv: Option<String>,
}

impl EncryptionKey {
    /// The `METHOD=NONE` key: cleartext segments from here on.
    pub fn none() -> Self {
        Self {
            method: EncryptionMethod::None,
            uri: None,
            iv: None,
        }
    }
}

/// One fetchable media chunk from a media playlist
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Absolute URL of the segment
    pub url: String,
    /// Declared duration in seconds; always positive (a pending duration
    /// that is missing or non-positive never emits a segment)
    pub duration: f64,
    /// Comment field of the `#EXTINF` tag, when non-empty
    pub title: Option<String>,
    /// The key in effect for this segment; `None` when the playlist never
    /// declared one
    pub key: Option<EncryptionKey>,
    /// True iff a discontinuity tag immediately preceded this segment
    pub discontinuity: bool,
}

/// Playlist type declared by `#EXT-X-PLAYLIST-TYPE`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistType {
    Vod,
    Event,
}

impl PlaylistType {
    pub(crate) fn from_attr(value: &str) -> Option<Self> {
        match value {
            "VOD" => Some(Self::Vod),
            "EVENT" => Some(Self::Event),
            _ => None,
        }
    }
}

impl fmt::Display for PlaylistType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vod => f.write_str("VOD"),
            Self::Event => f.write_str("EVENT"),
        }
    }
}

/// A parsed media playlist: the ordered segment list of one variant
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaPlaylist {
    pub version: Option<u32>,
    /// Upper bound on segment duration in seconds, from
    /// `#EXT-X-TARGETDURATION` (0 when absent or non-numeric)
    pub target_duration: u64,
    pub segments: Vec<Segment>,
    /// True iff `#EXT-X-ENDLIST` was seen; false means the playlist may
    /// still be growing (live)
    pub end_list: bool,
    pub playlist_type: Option<PlaylistType>,
}

impl MediaPlaylist {
    /// Total declared duration of all segments, in seconds.
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }
}
