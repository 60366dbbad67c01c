//! Artist result model.

use serde::{Deserialize, Serialize};

/// An artist entry from an artist listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtistItem {
    /// Provider artist ID.
    pub id: String,

    /// Artist name.
    pub name: String,
}

impl ArtistItem {
    /// Create a new artist with ID and name.
    pub fn new<S1: Into<String>, S2: Into<String>>(id: S1, name: S2) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}
