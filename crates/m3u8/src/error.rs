use thiserror::Error;

/// Errors that can occur during playlist parsing
///
/// Malformed attributes, tags, and entries are skipped during parsing, so
/// the only fatal condition a document can trigger is a missing header.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaylistError {
    #[error("invalid M3U8 playlist: missing #EXTM3U header")]
    MissingHeader,
}
