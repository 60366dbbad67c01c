//! The per-provider half of a query: request construction and parsing.

use std::future::Future;

use serde_json::Value;

use crate::error::Result;
use crate::models::ResultItem;
use crate::transport::{ProviderRequest, Transport};

/// Paging parameters handed to [`QueryCapability::build_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest<'a> {
    /// Search key (the resolved one, when the query resolves terms).
    pub search_text: &'a str,
    /// Zero-based page index.
    pub offset: usize,
    /// Items per page.
    pub page_size: usize,
}

/// What one provider query knows how to do.
///
/// [`QueryRequest`](super::QueryRequest) owns the paging state machine and
/// drives an implementation of this trait for everything provider-specific.
pub trait QueryCapability: Send + Sync + 'static {
    /// Short name for logs, e.g. `"KWArtistList"`.
    fn name(&self) -> &'static str;

    /// Page size used unless overridden.
    fn default_page_size(&self) -> usize;

    /// Whether the body uses single quotes that must become double quotes
    /// before strict JSON parsing.
    fn repair_quotes(&self) -> bool {
        false
    }

    /// Build the exchange for one page.
    fn build_request(&self, page: &PageRequest<'_>) -> Result<ProviderRequest>;

    /// Provider-specific success marker.
    fn is_success(&self, body: &Value) -> bool;

    /// Server-reported total number of items.
    fn page_total(&self, body: &Value) -> usize;

    /// The raw item array of a successful body.
    fn items<'a>(&self, body: &'a Value) -> &'a [Value];

    /// Normalize one raw item. `None` skips it.
    fn to_item(&self, raw: &Value) -> Option<ResultItem>;

    /// Turn a user search term into the key pages are fetched with.
    ///
    /// Most queries page over the term itself. Queries that need an
    /// auxiliary lookup first override this; `Ok(None)` means the lookup
    /// found nothing and no page should be fetched.
    fn resolve<T: Transport>(
        &self,
        _transport: &T,
        term: &str,
    ) -> impl Future<Output = Result<Option<String>>> + Send {
        let term = term.to_string();
        async move { Ok(Some(term)) }
    }
}
