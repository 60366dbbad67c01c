//! Data models for normalized provider results.
//!
//! Every provider parser maps its own JSON shape into these records.

pub mod album;
pub mod artist;
pub mod comment;
pub mod common;
pub mod song;

// Re-exports for convenience
pub use album::AlbumItem;
pub use artist::ArtistItem;
pub use comment::CommentItem;
pub use common::ResultItem;
pub use song::{SongItem, SongVariant};
