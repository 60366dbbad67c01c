//! Comment result model.

use serde::{Deserialize, Serialize};

/// A user comment on a song or playlist.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommentItem {
    /// Commenter display name.
    pub nickname: String,

    /// Commenter avatar URL.
    pub avatar_url: String,

    /// Number of likes.
    pub like_count: u64,

    /// Post time as a Unix timestamp in milliseconds.
    pub timestamp: u64,

    /// Comment body.
    pub text: String,
}
