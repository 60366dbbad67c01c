//! Song result models.
//!
//! A song carries every quality variant the provider advertised for it;
//! download selection picks among those variants.

use serde::{Deserialize, Serialize};

/// One downloadable quality variant of a song.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SongVariant {
    /// Bitrate in kbps. Not unique within a song.
    pub bitrate: u32,

    /// File format / extension without the dot (e.g. "mp3", "flac").
    pub format: String,

    /// Direct media URL.
    pub url: String,
}

impl SongVariant {
    /// Create a new variant.
    pub fn new<S1: Into<String>, S2: Into<String>>(bitrate: u32, format: S1, url: S2) -> Self {
        Self {
            bitrate,
            format: format.into(),
            url: url.into(),
        }
    }
}

/// A song as normalized from any provider's search response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SongItem {
    /// Provider song ID.
    pub id: String,

    /// Song title.
    pub title: String,

    /// Singer / artist display name.
    pub artist: String,

    /// Provider album ID.
    #[serde(default)]
    pub album_id: String,

    /// Duration in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,

    /// Quality variants in provider order.
    #[serde(default)]
    pub variants: Vec<SongVariant>,

    /// Cover thumbnail URLs, smallest first.
    #[serde(default)]
    pub thumbnails: Vec<String>,
}

impl SongItem {
    /// Create a song with an ID, title and artist.
    pub fn new<S1: Into<String>, S2: Into<String>, S3: Into<String>>(
        id: S1,
        title: S2,
        artist: S3,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            ..Default::default()
        }
    }

    /// Get duration formatted as MM:SS.
    pub fn duration_formatted(&self) -> String {
        let total_seconds = self.duration_ms / 1000;
        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;
        format!("{:02}:{:02}", minutes, seconds)
    }

    /// The stable identity used for cache naming: `"<artist> - <title>"`.
    pub fn identity(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }

    /// Lowest advertised bitrate, if any variant exists.
    pub fn min_bitrate(&self) -> Option<u32> {
        self.variants.iter().map(|v| v.bitrate).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_formatted() {
        let mut song = SongItem::new("1", "Yesterday", "The Beatles");
        song.duration_ms = 125_000;
        assert_eq!(song.duration_formatted(), "02:05");
    }

    #[test]
    fn test_identity() {
        let song = SongItem::new("1", "Yesterday", "The Beatles");
        assert_eq!(song.identity(), "The Beatles - Yesterday");
    }

    #[test]
    fn test_min_bitrate() {
        let mut song = SongItem::new("1", "t", "a");
        assert_eq!(song.min_bitrate(), None);

        song.variants = vec![
            SongVariant::new(320, "mp3", "u1"),
            SongVariant::new(128, "mp3", "u2"),
        ];
        assert_eq!(song.min_bitrate(), Some(128));
    }
}
