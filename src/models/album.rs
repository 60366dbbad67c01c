//! Album result model.

use serde::{Deserialize, Serialize};

/// Album summary as returned by album listings.
///
/// Every descriptive field may be empty; [`AlbumItem::display_fields`]
/// substitutes `-` for missing values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlbumItem {
    /// Provider album ID.
    pub id: String,

    /// Album title.
    pub name: String,

    /// Language label.
    #[serde(default)]
    pub language: String,

    /// Publishing company.
    #[serde(default)]
    pub company: String,

    /// Release year (or full release date, as reported).
    #[serde(default)]
    pub year: String,

    /// Cover image URL.
    #[serde(default)]
    pub cover_url: String,
}

impl AlbumItem {
    /// Name, language, company and year with `-` in place of empty values.
    pub fn display_fields(&self) -> [&str; 4] {
        fn or_dash(s: &str) -> &str {
            if s.is_empty() {
                "-"
            } else {
                s
            }
        }
        [
            or_dash(&self.name),
            or_dash(&self.language),
            or_dash(&self.company),
            or_dash(&self.year),
        ]
    }
}
