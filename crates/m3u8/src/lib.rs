//! M3U8 (HTTP Live Streaming) playlist parser
//!
//! This crate parses HLS master and media playlists into immutable value
//! objects: quality variants, alternate renditions, encryption keys, and
//! ordered media segments. Parsing is a single forward pass over the
//! document text with no I/O and no shared state, so every function here is
//! safe to call from any thread.
//!
//! Parsing is permissive: an individually malformed attribute, tag, or
//! segment entry is skipped rather than failing the document. The only fatal
//! condition is a missing `#EXTM3U` header.

pub mod attrs;
pub mod error;
pub mod master;
pub mod media;
pub mod playlist;
mod scan;
pub mod types;
pub mod url;

pub use attrs::parse_attribute_list;
pub use error::PlaylistError;
pub use master::parse_master;
pub use media::parse_media;
pub use playlist::{Playlist, is_master, parse};
pub use types::{
    EncryptionKey, EncryptionMethod, MasterPlaylist, MediaPlaylist, PlaylistType, Rendition,
    RenditionKind, Resolution, Segment, Variant,
};
pub use url::resolve;

/// Result type for playlist parsing operations
pub type Result<T> = std::result::Result<T, PlaylistError>;
