//! WY provider queries.
//!
//! Every WY request is a POST of a signed form: the JSON payload is wrapped
//! by [`crypto::sign_wy_payload`] and sent to the endpoint URL. Success is
//! `code == 200`.

use std::future::Future;

use serde_json::{json, Value};
use tracing::{debug, info};

use super::{get_array, get_id, get_str, get_u64};
use crate::crypto;
use crate::error::{MusicNetError, Result};
use crate::models::{CommentItem, ResultItem, SongItem, SongVariant};
use crate::query::{PageRequest, QueryCapability, QueryEvent, QueryOutcome, QueryRequest};
use crate::transport::{ProviderRequest, Transport};

/// Song search endpoint.
const WY_SEARCH_URL: &str = "https://music.163.com/weapi/cloudsearch/get/web?csrf_token=";

/// Comment thread endpoint; `{thread}` is e.g. `R_SO_4_<song id>`.
const WY_COMMENT_URL: &str =
    "https://music.163.com/weapi/v1/resource/comments/{thread}?csrf_token=";

/// Direct media URL template.
const WY_MEDIA_URL: &str = "https://music.163.com/song/media/outer/url?id={id}.mp3";

/// Referer required by the weapi endpoints.
const WY_REFERER: &str = "https://music.163.com/";

/// Quality tiers in ascending order.
const WY_QUALITIES: &[&str] = &["l", "m", "h"];

fn signed_request(url: &str, payload: &Value) -> Result<ProviderRequest> {
    let form = crypto::sign_wy_payload(&payload.to_string())?;
    Ok(ProviderRequest::post_form(url, form.into_pairs()).with_header("Referer", WY_REFERER))
}

fn is_ok(body: &Value) -> bool {
    get_u64(body, "code") == 200
}

fn comment_request(thread: &str, page: &PageRequest<'_>) -> Result<ProviderRequest> {
    let payload = json!({
        "rid": thread,
        "offset": page.page_size * page.offset,
        "total": true,
        "limit": page.page_size,
        "csrf_token": ""
    });
    signed_request(&WY_COMMENT_URL.replace("{thread}", thread), &payload)
}

fn parse_comment(raw: &Value) -> Option<ResultItem> {
    let user = raw.get("user").unwrap_or(&Value::Null);
    Some(ResultItem::Comment(CommentItem {
        nickname: get_str(user, "nickname"),
        avatar_url: get_str(user, "avatarUrl"),
        like_count: get_u64(raw, "likedCount"),
        timestamp: get_u64(raw, "time"),
        text: get_str(raw, "content"),
    }))
}

/// Song search.
#[derive(Debug, Clone, Copy, Default)]
pub struct SongQuery;

impl QueryCapability for SongQuery {
    fn name(&self) -> &'static str {
        "WYSongs"
    }

    fn default_page_size(&self) -> usize {
        30
    }

    fn build_request(&self, page: &PageRequest<'_>) -> Result<ProviderRequest> {
        let payload = json!({
            "s": page.search_text,
            "type": 1,
            "limit": page.page_size,
            "offset": page.page_size * page.offset,
            "total": true,
            "csrf_token": ""
        });
        signed_request(WY_SEARCH_URL, &payload)
    }

    fn is_success(&self, body: &Value) -> bool {
        is_ok(body)
    }

    fn page_total(&self, body: &Value) -> usize {
        body.get("result")
            .map(|r| get_u64(r, "songCount"))
            .unwrap_or(0) as usize
    }

    fn items<'a>(&self, body: &'a Value) -> &'a [Value] {
        body.get("result")
            .map(|r| get_array(r, "songs"))
            .unwrap_or(&[])
    }

    fn to_item(&self, raw: &Value) -> Option<ResultItem> {
        let id = get_id(raw, "id");
        if id.is_empty() {
            return None;
        }

        let artist = get_array(raw, "ar")
            .iter()
            .map(|a| get_str(a, "name"))
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        let album = raw.get("al").unwrap_or(&Value::Null);
        let media = WY_MEDIA_URL.replace("{id}", &id);

        let variants = WY_QUALITIES
            .iter()
            .filter_map(|tier| raw.get(*tier).filter(|q| q.is_object()))
            .map(|quality| SongVariant::new((get_u64(quality, "br") / 1000) as u32, "mp3", media.clone()))
            .collect();

        let cover = get_str(album, "picUrl");
        Some(ResultItem::Song(SongItem {
            title: get_str(raw, "name"),
            artist,
            album_id: get_id(album, "id"),
            duration_ms: get_u64(raw, "dt"),
            variants,
            thumbnails: if cover.is_empty() { Vec::new() } else { vec![cover] },
            id,
        }))
    }
}

/// Comments on a song. Searching resolves the term to a song ID first.
#[derive(Debug, Clone, Copy, Default)]
pub struct SongCommentsQuery;

impl QueryCapability for SongCommentsQuery {
    fn name(&self) -> &'static str {
        "WYSongComments"
    }

    fn default_page_size(&self) -> usize {
        20
    }

    fn build_request(&self, page: &PageRequest<'_>) -> Result<ProviderRequest> {
        comment_request(&format!("R_SO_4_{}", page.search_text), page)
    }

    fn is_success(&self, body: &Value) -> bool {
        is_ok(body)
    }

    fn page_total(&self, body: &Value) -> usize {
        get_u64(body, "total") as usize
    }

    fn items<'a>(&self, body: &'a Value) -> &'a [Value] {
        get_array(body, "comments")
    }

    fn to_item(&self, raw: &Value) -> Option<ResultItem> {
        parse_comment(raw)
    }

    /// Look the term up with a one-result song search and page over the
    /// comments of the first hit.
    fn resolve<T: Transport>(
        &self,
        transport: &T,
        term: &str,
    ) -> impl Future<Output = Result<Option<String>>> + Send {
        let transport = transport.clone();
        let term = term.to_string();
        async move {
            let (lookup, mut events) = QueryRequest::new(SongQuery, transport);
            let lookup = lookup.with_page_size(1);
            lookup.start_to_search(&term).await;

            let mut song_id = None;
            while let Some(event) = events.recv().await {
                match event {
                    QueryEvent::ItemDiscovered {
                        item: ResultItem::Song(song),
                        ..
                    } if song_id.is_none() => song_id = Some(song.id),
                    QueryEvent::Completed { outcome, .. } => {
                        debug!("Song lookup for {} finished: {:?}", term, outcome);
                        match outcome {
                            QueryOutcome::TransportError(e) | QueryOutcome::ParseError(e) => {
                                return Err(MusicNetError::Provider(format!(
                                    "song lookup failed: {}",
                                    e
                                )));
                            }
                            _ => break,
                        }
                    }
                    _ => {}
                }
            }

            info!("Resolved {:?} to song id {:?}", term, song_id);
            Ok(song_id)
        }
    }
}

/// Comments on a playlist; the search text is the playlist ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaylistCommentsQuery;

impl QueryCapability for PlaylistCommentsQuery {
    fn name(&self) -> &'static str {
        "WYPlaylistComments"
    }

    fn default_page_size(&self) -> usize {
        20
    }

    fn build_request(&self, page: &PageRequest<'_>) -> Result<ProviderRequest> {
        comment_request(&format!("A_PL_0_{}", page.search_text), page)
    }

    fn is_success(&self, body: &Value) -> bool {
        is_ok(body)
    }

    fn page_total(&self, body: &Value) -> usize {
        get_u64(body, "total") as usize
    }

    fn items<'a>(&self, body: &'a Value) -> &'a [Value] {
        get_array(body, "comments")
    }

    fn to_item(&self, raw: &Value) -> Option<ResultItem> {
        parse_comment(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::stub::StubTransport;
    use crate::transport::Method;

    fn search_body() -> String {
        json!({
            "code": 200,
            "result": {
                "songCount": 1,
                "songs": [{
                    "id": 186016,
                    "name": "Yesterday",
                    "ar": [{"name": "The Beatles"}],
                    "al": {"id": 18905, "picUrl": "http://p1/cover.jpg"},
                    "dt": 125000,
                    "h": {"br": 320000},
                    "m": {"br": 192000},
                    "l": {"br": 128000}
                }]
            }
        })
        .to_string()
    }

    fn comments_body() -> String {
        json!({
            "code": 200,
            "total": 2,
            "comments": [
                {"user": {"nickname": "ann", "avatarUrl": "http://a/1"}, "likedCount": 5, "time": 1500000000000u64, "content": "classic"},
                {"user": {"nickname": "bob", "avatarUrl": "http://a/2"}, "likedCount": 0, "time": 1500000000001u64, "content": "agreed"}
            ]
        })
        .to_string()
    }

    #[test]
    fn test_signed_search_request() {
        let page = PageRequest {
            search_text: "Yesterday",
            offset: 2,
            page_size: 30,
        };
        let request = SongQuery.build_request(&page).unwrap();
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url, WY_SEARCH_URL);
        let form = request.form.unwrap();
        assert_eq!(form[0].0, "params");
        assert_eq!(form[1].0, "encSecKey");
        assert!(request.headers.iter().any(|(k, _)| k == "Referer"));
    }

    #[test]
    fn test_song_item_mapping() {
        let body: Value = serde_json::from_str(&search_body()).unwrap();
        assert!(SongQuery.is_success(&body));
        assert_eq!(SongQuery.page_total(&body), 1);

        let raw = &SongQuery.items(&body)[0];
        let song = SongQuery.to_item(raw).unwrap().into_song().unwrap();
        assert_eq!(song.id, "186016");
        assert_eq!(song.artist, "The Beatles");
        assert_eq!(song.album_id, "18905");
        assert_eq!(
            song.variants.iter().map(|v| v.bitrate).collect::<Vec<_>>(),
            vec![128, 192, 320]
        );
        assert!(song.variants[0].url.contains("id=186016"));
    }

    #[test]
    fn test_playlist_comment_thread() {
        let page = PageRequest {
            search_text: "24381616",
            offset: 1,
            page_size: 20,
        };
        let request = PlaylistCommentsQuery.build_request(&page).unwrap();
        assert!(request.url.contains("A_PL_0_24381616"));
    }

    #[tokio::test]
    async fn test_song_comments_resolve_then_page() {
        let transport = StubTransport::new()
            .route("cloudsearch", &search_body())
            .route("R_SO_4_186016", &comments_body());
        let (request, mut rx) = QueryRequest::new(SongCommentsQuery, transport.clone());

        assert!(request.start_to_search("Yesterday").await);

        let mut comments = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                QueryEvent::ItemDiscovered {
                    item: ResultItem::Comment(c),
                    ..
                } => comments.push(c),
                QueryEvent::Completed { outcome, .. } => {
                    assert_eq!(outcome, QueryOutcome::Success { items: 2 });
                    break;
                }
                other => panic!("unexpected event {:?}", other),
            }
        }

        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].nickname, "ann");
        assert_eq!(comments[0].like_count, 5);
        assert_eq!(request.search_text(), "Yesterday");
        assert_eq!(request.state().query_key, "186016");

        let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
        assert!(urls[0].contains("cloudsearch"));
        assert!(urls[1].contains("R_SO_4_186016"));
    }

    #[tokio::test]
    async fn test_song_comments_lookup_miss() {
        let empty = json!({"code": 200, "result": {"songCount": 0, "songs": []}}).to_string();
        let transport = StubTransport::new().route("cloudsearch", &empty);
        let (request, mut rx) = QueryRequest::new(SongCommentsQuery, transport.clone());

        request.start_to_search("nothing like this").await;

        assert_eq!(
            rx.recv().await,
            Some(QueryEvent::Completed {
                page: 0,
                outcome: QueryOutcome::Empty,
            })
        );
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_song_comments_lookup_failure_is_transport_error() {
        let transport = StubTransport::new().fail("cloudsearch", "connection reset");
        let (request, mut rx) = QueryRequest::new(SongCommentsQuery, transport.clone());

        request.start_to_search("Yesterday").await;

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            QueryEvent::Completed {
                page: 0,
                outcome: QueryOutcome::TransportError(_),
            }
        ));
        assert_eq!(transport.requests().len(), 1);
        assert!(matches!(rx.try_recv(), Err(_)));
    }

    #[tokio::test]
    async fn test_song_comments_lookup_rejected_is_transport_error() {
        let rejected = json!({"code": 405, "msg": "cheating"}).to_string();
        let transport = StubTransport::new().route("cloudsearch", &rejected);
        let (request, mut rx) = QueryRequest::new(SongCommentsQuery, transport);

        request.start_to_search("Yesterday").await;

        assert!(matches!(
            rx.recv().await,
            Some(QueryEvent::Completed {
                outcome: QueryOutcome::TransportError(_),
                ..
            })
        ));
    }
}
