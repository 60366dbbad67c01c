//! KW provider queries.
//!
//! KW answers with single-quoted pseudo-JSON, so every query here asks for
//! quote repair. Success is signalled by the presence of the item array.

use reqwest::Url;
use serde_json::Value;

use super::{get_array, get_id, get_str, get_u64};
use crate::error::{MusicNetError, Result};
use crate::models::{AlbumItem, ArtistItem, ResultItem, SongItem, SongVariant};
use crate::query::{PageRequest, QueryCapability};
use crate::transport::ProviderRequest;

/// Search and album listing endpoint.
const KW_SEARCH_URL: &str = "http://search.kuwo.cn/r.s";

/// Artist listing endpoint.
const KW_ARTIST_LIST_URL: &str = "http://artistlistinfo.kuwo.cn/mb.slist";

/// Media URL resolver.
const KW_MEDIA_URL: &str = "http://antiserver.kuwo.cn/anti.s";

/// Prefix for relative album cover paths.
const KW_COVER_URL: &str = "http://img4.kuwo.cn/star/albumcover/";

/// Separates the category from the initial-letter index in an artist
/// list search text: `"<category>*|||*<index>"`.
pub const SEPARATOR: &str = "*|||*";

/// Known `FORMATS` tokens: (token, bitrate, extension, `br` parameter).
const KW_FORMATS: &[(&str, u32, &str, &str)] = &[
    ("MP3128", 128, "mp3", "128kmp3"),
    ("MP3192", 192, "mp3", "192kmp3"),
    ("MP3H", 320, "mp3", "320kmp3"),
    ("ALFLAC", 1000, "flac", "2000kflac"),
];

fn build_url(base: &str, params: &[(&str, String)]) -> Result<String> {
    Url::parse_with_params(base, params)
        .map(String::from)
        .map_err(|e| MusicNetError::Provider(format!("Invalid KW URL: {}", e)))
}

fn media_url(song_id: &str, format: &str, br: &str) -> String {
    format!(
        "{}?type=convert_url&format={}&response=url&rid=MUSIC_{}&br={}",
        KW_MEDIA_URL, format, song_id, br
    )
}

fn cover_url(path: &str) -> String {
    if path.is_empty() || path.starts_with("http") {
        path.to_string()
    } else {
        format!("{}{}", KW_COVER_URL, path)
    }
}

/// Parse the `|`-separated `FORMATS` field into variants, in listed order.
fn parse_formats(song_id: &str, formats: &str) -> Vec<SongVariant> {
    formats
        .split('|')
        .filter_map(|token| KW_FORMATS.iter().find(|(name, ..)| *name == token))
        .map(|(_, bitrate, ext, br)| SongVariant::new(*bitrate, *ext, media_url(song_id, ext, br)))
        .collect()
}

/// Song search.
#[derive(Debug, Clone, Copy, Default)]
pub struct SongQuery;

impl QueryCapability for SongQuery {
    fn name(&self) -> &'static str {
        "KWSongs"
    }

    fn default_page_size(&self) -> usize {
        30
    }

    fn repair_quotes(&self) -> bool {
        true
    }

    fn build_request(&self, page: &PageRequest<'_>) -> Result<ProviderRequest> {
        let url = build_url(
            KW_SEARCH_URL,
            &[
                ("all", page.search_text.to_string()),
                ("ft", "music".to_string()),
                ("itemset", "web_2013".to_string()),
                ("client", "kt".to_string()),
                ("rformat", "json".to_string()),
                ("encoding", "utf8".to_string()),
                ("pn", page.offset.to_string()),
                ("rn", page.page_size.to_string()),
            ],
        )?;
        Ok(ProviderRequest::get(url))
    }

    fn is_success(&self, body: &Value) -> bool {
        body.get("abslist").is_some_and(Value::is_array)
    }

    fn page_total(&self, body: &Value) -> usize {
        get_u64(body, "TOTAL") as usize
    }

    fn items<'a>(&self, body: &'a Value) -> &'a [Value] {
        get_array(body, "abslist")
    }

    fn to_item(&self, raw: &Value) -> Option<ResultItem> {
        let rid = get_str(raw, "MUSICRID");
        let id = rid.strip_prefix("MUSIC_").unwrap_or(&rid).to_string();
        if id.is_empty() {
            return None;
        }

        let thumbnail = cover_url(&get_str(raw, "web_albumpic_short"));
        let song = SongItem {
            variants: parse_formats(&id, &get_str(raw, "FORMATS")),
            title: get_str(raw, "SONGNAME"),
            artist: get_str(raw, "ARTIST"),
            album_id: get_id(raw, "ALBUMID"),
            duration_ms: get_u64(raw, "DURATION") * 1000,
            thumbnails: if thumbnail.is_empty() {
                Vec::new()
            } else {
                vec![thumbnail]
            },
            id,
        };
        Some(ResultItem::Song(song))
    }
}

/// Artist listing by category and initial letter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtistListQuery;

impl ArtistListQuery {
    /// Split a search text into category ID and optional initial letter.
    fn split_search(text: &str) -> (String, Option<char>) {
        let parts: Vec<&str> = text.split(SEPARATOR).collect();
        if parts.len() != 2 {
            return ("0".to_string(), None);
        }

        let category = if parts[0].is_empty() { "0" } else { parts[0] };
        let initial = parts[1]
            .trim()
            .parse::<u8>()
            .ok()
            .filter(|index| *index < 26)
            .map(|index| (b'A' + index) as char);
        (category.to_string(), initial)
    }
}

impl QueryCapability for ArtistListQuery {
    fn name(&self) -> &'static str {
        "KWArtistList"
    }

    fn default_page_size(&self) -> usize {
        100
    }

    fn repair_quotes(&self) -> bool {
        true
    }

    fn build_request(&self, page: &PageRequest<'_>) -> Result<ProviderRequest> {
        let (category, initial) = Self::split_search(page.search_text);
        let mut params = vec![
            ("stype", "artistlist".to_string()),
            ("category", category),
            ("order", "hot".to_string()),
            ("pn", page.offset.to_string()),
            ("rn", page.page_size.to_string()),
        ];
        if let Some(letter) = initial {
            params.push(("prefix", letter.to_string()));
        }
        Ok(ProviderRequest::get(build_url(KW_ARTIST_LIST_URL, &params)?))
    }

    fn is_success(&self, body: &Value) -> bool {
        body.get("artistlist").is_some()
    }

    fn page_total(&self, body: &Value) -> usize {
        get_u64(body, "total") as usize
    }

    fn items<'a>(&self, body: &'a Value) -> &'a [Value] {
        get_array(body, "artistlist")
    }

    fn to_item(&self, raw: &Value) -> Option<ResultItem> {
        Some(ResultItem::Artist(ArtistItem::new(
            get_id(raw, "id"),
            get_str(raw, "name"),
        )))
    }
}

/// Albums of one artist; the search text is the artist ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtistAlbumsQuery;

impl QueryCapability for ArtistAlbumsQuery {
    fn name(&self) -> &'static str {
        "KWArtistAlbums"
    }

    fn default_page_size(&self) -> usize {
        20
    }

    fn repair_quotes(&self) -> bool {
        true
    }

    fn build_request(&self, page: &PageRequest<'_>) -> Result<ProviderRequest> {
        let url = build_url(
            KW_SEARCH_URL,
            &[
                ("stype", "albumlist".to_string()),
                ("artistid", page.search_text.to_string()),
                ("sortby", "1".to_string()),
                ("alflac", "1".to_string()),
                ("encoding", "utf8".to_string()),
                ("pn", page.offset.to_string()),
                ("rn", page.page_size.to_string()),
            ],
        )?;
        Ok(ProviderRequest::get(url))
    }

    fn is_success(&self, body: &Value) -> bool {
        body.get("albumlist").is_some_and(Value::is_array)
    }

    fn page_total(&self, body: &Value) -> usize {
        get_u64(body, "total") as usize
    }

    fn items<'a>(&self, body: &'a Value) -> &'a [Value] {
        get_array(body, "albumlist")
    }

    fn to_item(&self, raw: &Value) -> Option<ResultItem> {
        Some(ResultItem::Album(AlbumItem {
            id: get_id(raw, "albumid"),
            name: get_str(raw, "name"),
            language: get_str(raw, "lang"),
            company: get_str(raw, "company"),
            year: get_str(raw, "pub"),
            cover_url: cover_url(&get_str(raw, "pic")),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{QueryEvent, QueryOutcome, QueryRequest};
    use crate::transport::stub::StubTransport;
    use serde_json::json;

    #[test]
    fn test_split_search() {
        assert_eq!(
            ArtistListQuery::split_search("11*|||*2"),
            ("11".to_string(), Some('C'))
        );
        assert_eq!(
            ArtistListQuery::split_search("*|||*-1"),
            ("0".to_string(), None)
        );
        assert_eq!(ArtistListQuery::split_search("plain"), ("0".to_string(), None));
    }

    #[test]
    fn test_artist_list_url() {
        let page = PageRequest {
            search_text: "5*|||*0",
            offset: 2,
            page_size: 100,
        };
        let request = ArtistListQuery.build_request(&page).unwrap();
        assert!(request.url.starts_with(KW_ARTIST_LIST_URL));
        assert!(request.url.contains("category=5"));
        assert!(request.url.contains("pn=2"));
        assert!(request.url.contains("rn=100"));
        assert!(request.url.contains("prefix=A"));
    }

    #[test]
    fn test_song_item_variants_follow_formats_order() {
        let raw = json!({
            "MUSICRID": "MUSIC_42",
            "SONGNAME": "Yesterday",
            "ARTIST": "The Beatles",
            "ALBUMID": "7",
            "DURATION": "125",
            "FORMATS": "WMA96|MP3H|MP3128|ALFLAC",
            "web_albumpic_short": "120/s4s12/40/1.jpg"
        });

        let song = SongQuery.to_item(&raw).unwrap().into_song().unwrap();
        assert_eq!(song.id, "42");
        assert_eq!(song.duration_ms, 125_000);
        assert_eq!(
            song.variants.iter().map(|v| v.bitrate).collect::<Vec<_>>(),
            vec![320, 128, 1000]
        );
        assert!(song.variants[1].url.contains("rid=MUSIC_42"));
        assert!(song.variants[1].url.contains("br=128kmp3"));
        assert!(song.thumbnails[0].starts_with(KW_COVER_URL));
    }

    #[test]
    fn test_song_without_rid_is_skipped() {
        assert!(SongQuery.to_item(&json!({"SONGNAME": "x"})).is_none());
    }

    #[test]
    fn test_album_item() {
        let raw = json!({
            "albumid": 99,
            "name": "Abbey Road",
            "lang": "English",
            "company": "Apple",
            "pub": "1969-09-26",
            "pic": "http://img/abbey.jpg"
        });
        let item = ArtistAlbumsQuery.to_item(&raw).unwrap();
        let ResultItem::Album(album) = item else {
            panic!("expected album");
        };
        assert_eq!(album.id, "99");
        assert_eq!(album.cover_url, "http://img/abbey.jpg");
    }

    #[tokio::test]
    async fn test_artist_list_single_quoted_reply() {
        let body = "{'total':'2','artistlist':[{'id':'1','name':'Adele'},null,{'id':'2','name':'Beyonce'}]}";
        let transport = StubTransport::new().route("mb.slist", body);
        let (request, mut rx) = QueryRequest::new(ArtistListQuery, transport);

        request.start_to_search("0*|||*-1").await;

        let mut names = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                QueryEvent::ItemDiscovered { item, .. } => names.push(item.label()),
                QueryEvent::Completed { outcome, .. } => {
                    assert_eq!(outcome, QueryOutcome::Success { items: 2 });
                    break;
                }
            }
        }
        assert_eq!(names, vec!["Adele", "Beyonce"]);
        assert_eq!(request.page_total(), 2);
    }

    #[tokio::test]
    async fn test_artist_list_without_marker_is_parse_error() {
        let transport = StubTransport::new().route("mb.slist", "{'total':'0'}");
        let (request, mut rx) = QueryRequest::new(ArtistListQuery, transport);

        request.start_to_search("0*|||*1").await;
        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            QueryEvent::Completed { outcome: QueryOutcome::ParseError(_), .. }
        ));
    }
}
