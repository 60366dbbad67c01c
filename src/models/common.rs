//! Types shared by every query kind.

use serde::{Deserialize, Serialize};

use super::{AlbumItem, ArtistItem, CommentItem, SongItem};

/// One normalized item discovered by a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResultItem {
    Song(SongItem),
    Artist(ArtistItem),
    Comment(CommentItem),
    Album(AlbumItem),
}

impl ResultItem {
    /// Short label for the item, used in logs and listings.
    pub fn label(&self) -> String {
        match self {
            ResultItem::Song(s) => s.identity(),
            ResultItem::Artist(a) => a.name.clone(),
            ResultItem::Comment(c) => format!("{}: {}", c.nickname, c.text),
            ResultItem::Album(a) => a.name.clone(),
        }
    }

    /// Borrow the song, if this is one.
    pub fn as_song(&self) -> Option<&SongItem> {
        match self {
            ResultItem::Song(s) => Some(s),
            _ => None,
        }
    }

    /// Take the song, if this is one.
    pub fn into_song(self) -> Option<SongItem> {
        match self {
            ResultItem::Song(s) => Some(s),
            _ => None,
        }
    }
}
