//! Provider query implementations.
//!
//! Each provider module holds one struct per query kind implementing
//! [`QueryCapability`]. [`ProviderQuery`] closes the set so callers pick a
//! query at construction time and drive it through one concrete type.

pub mod kw;
pub mod wy;

use std::fmt;
use std::future::Future;

use serde_json::Value;

use crate::error::{MusicNetError, Result};
use crate::models::ResultItem;
use crate::query::{PageRequest, QueryCapability};
use crate::transport::{ProviderRequest, Transport};

/// External service a query talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Kw,
    Wy,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Kw => write!(f, "KW"),
            Provider::Wy => write!(f, "WY"),
        }
    }
}

/// What a query lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Songs,
    ArtistList,
    ArtistAlbums,
    SongComments,
    PlaylistComments,
}

/// Every concrete provider query.
#[derive(Debug, Clone)]
pub enum ProviderQuery {
    KwSongs(kw::SongQuery),
    KwArtistList(kw::ArtistListQuery),
    KwArtistAlbums(kw::ArtistAlbumsQuery),
    WySongs(wy::SongQuery),
    WySongComments(wy::SongCommentsQuery),
    WyPlaylistComments(wy::PlaylistCommentsQuery),
}

impl ProviderQuery {
    /// Select the query for `kind` on `provider`.
    pub fn new(provider: Provider, kind: QueryKind) -> Result<Self> {
        let query = match (provider, kind) {
            (Provider::Kw, QueryKind::Songs) => ProviderQuery::KwSongs(kw::SongQuery),
            (Provider::Kw, QueryKind::ArtistList) => {
                ProviderQuery::KwArtistList(kw::ArtistListQuery)
            }
            (Provider::Kw, QueryKind::ArtistAlbums) => {
                ProviderQuery::KwArtistAlbums(kw::ArtistAlbumsQuery)
            }
            (Provider::Wy, QueryKind::Songs) => ProviderQuery::WySongs(wy::SongQuery),
            (Provider::Wy, QueryKind::SongComments) => {
                ProviderQuery::WySongComments(wy::SongCommentsQuery)
            }
            (Provider::Wy, QueryKind::PlaylistComments) => {
                ProviderQuery::WyPlaylistComments(wy::PlaylistCommentsQuery)
            }
            (provider, kind) => {
                return Err(MusicNetError::Provider(format!(
                    "{} does not support {:?} queries",
                    provider, kind
                )))
            }
        };
        Ok(query)
    }

    /// The provider this query talks to.
    pub fn provider(&self) -> Provider {
        match self {
            ProviderQuery::KwSongs(_)
            | ProviderQuery::KwArtistList(_)
            | ProviderQuery::KwArtistAlbums(_) => Provider::Kw,
            ProviderQuery::WySongs(_)
            | ProviderQuery::WySongComments(_)
            | ProviderQuery::WyPlaylistComments(_) => Provider::Wy,
        }
    }
}

macro_rules! dispatch {
    ($self:expr, $q:ident => $body:expr) => {
        match $self {
            ProviderQuery::KwSongs($q) => $body,
            ProviderQuery::KwArtistList($q) => $body,
            ProviderQuery::KwArtistAlbums($q) => $body,
            ProviderQuery::WySongs($q) => $body,
            ProviderQuery::WySongComments($q) => $body,
            ProviderQuery::WyPlaylistComments($q) => $body,
        }
    };
}

impl QueryCapability for ProviderQuery {
    fn name(&self) -> &'static str {
        dispatch!(self, q => q.name())
    }

    fn default_page_size(&self) -> usize {
        dispatch!(self, q => q.default_page_size())
    }

    fn repair_quotes(&self) -> bool {
        dispatch!(self, q => q.repair_quotes())
    }

    fn build_request(&self, page: &PageRequest<'_>) -> Result<ProviderRequest> {
        dispatch!(self, q => q.build_request(page))
    }

    fn is_success(&self, body: &Value) -> bool {
        dispatch!(self, q => q.is_success(body))
    }

    fn page_total(&self, body: &Value) -> usize {
        dispatch!(self, q => q.page_total(body))
    }

    fn items<'a>(&self, body: &'a Value) -> &'a [Value] {
        dispatch!(self, q => q.items(body))
    }

    fn to_item(&self, raw: &Value) -> Option<ResultItem> {
        dispatch!(self, q => q.to_item(raw))
    }

    fn resolve<T: Transport>(
        &self,
        transport: &T,
        term: &str,
    ) -> impl Future<Output = Result<Option<String>>> + Send {
        async move {
            match self {
                ProviderQuery::WySongComments(q) => q.resolve(transport, term).await,
                _ => Ok(Some(term.to_string())),
            }
        }
    }
}

/// Get string from JSON, returning empty string if not found.
pub(crate) fn get_str(json: &Value, key: &str) -> String {
    json.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

/// Get string ID from JSON (handles both string and numeric IDs).
pub(crate) fn get_id(json: &Value, key: &str) -> String {
    match json.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Get u64 from JSON, accepting numeric strings.
pub(crate) fn get_u64(json: &Value, key: &str) -> u64 {
    match json.get(key) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Borrow the array under `key`, or an empty slice.
pub(crate) fn get_array<'a>(json: &'a Value, key: &str) -> &'a [Value] {
    json.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_supported_pairs() {
        let query = ProviderQuery::new(Provider::Kw, QueryKind::ArtistList).unwrap();
        assert_eq!(query.provider(), Provider::Kw);
        assert_eq!(query.default_page_size(), 100);
        assert!(query.repair_quotes());

        let query = ProviderQuery::new(Provider::Wy, QueryKind::SongComments).unwrap();
        assert_eq!(query.provider(), Provider::Wy);
        assert_eq!(query.default_page_size(), 20);
        assert!(!query.repair_quotes());
    }

    #[test]
    fn test_new_unsupported_pair() {
        let result = ProviderQuery::new(Provider::Wy, QueryKind::ArtistList);
        assert!(matches!(result, Err(MusicNetError::Provider(_))));
    }

    #[test]
    fn test_json_helpers() {
        let json = json!({"a": "x", "n": 42, "s": " 17 ", "arr": [1, 2]});
        assert_eq!(get_str(&json, "a"), "x");
        assert_eq!(get_str(&json, "missing"), "");
        assert_eq!(get_id(&json, "n"), "42");
        assert_eq!(get_u64(&json, "s"), 17);
        assert_eq!(get_u64(&json, "a"), 0);
        assert_eq!(get_array(&json, "arr").len(), 2);
        assert!(get_array(&json, "a").is_empty());
    }
}
