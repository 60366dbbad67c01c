//! Paged provider queries.
//!
//! A [`QueryRequest`] runs one query cycle per requested page:
//! request → reply → parse → per-item emission → completion. Items and the
//! terminal completion are delivered as [`QueryEvent`]s on an unbounded
//! channel, so emission never waits on the consumer.
//!
//! # Supersession
//!
//! Starting a new page on the same request supersedes the cycle in flight.
//! The superseded cycle is completed with [`QueryOutcome::Superseded`] before
//! the new cycle starts, and its parse loop stops at the next item: events of
//! two pages of one request are never interleaved.

mod capability;

pub use capability::{PageRequest, QueryCapability};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{MusicNetError, Result};
use crate::models::ResultItem;
use crate::transport::Transport;

/// Whether network calls may proceed for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateCode {
    #[default]
    Idle,
    Querying,
    /// Terminal: the request was dropped.
    Cancelled,
}

/// How a query cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// At least one item was emitted.
    Success { items: usize },
    /// The provider answered successfully with nothing usable.
    Empty,
    /// The exchange itself failed.
    TransportError(String),
    /// The body was not JSON or lacked the provider's success marker.
    ParseError(String),
    /// A newer page request replaced this cycle.
    Superseded,
}

impl QueryOutcome {
    /// Whether any item was emitted.
    pub fn has_items(&self) -> bool {
        matches!(self, QueryOutcome::Success { .. })
    }
}

/// Notification sent to the consumer of a [`QueryRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryEvent {
    /// One normalized item of page `page`.
    ItemDiscovered { page: usize, item: ResultItem },
    /// Sent exactly once per cycle, after its last item.
    Completed { page: usize, outcome: QueryOutcome },
}

/// Paging state of one request.
#[derive(Debug, Clone, Default)]
pub struct QueryState {
    /// Term as given to `start_to_search`.
    pub search_text: String,
    /// Key pages are fetched with (differs from `search_text` when resolved).
    pub query_key: String,
    pub page_size: usize,
    pub page_offset: usize,
    /// Server-reported total; 0 until a page succeeds.
    pub page_total: usize,
    /// True from the moment a page starts until its cycle completes.
    pub interrupted: bool,
    pub code: StateCode,
    generation: u64,
}

struct Shared<Q> {
    capability: Q,
    state: Mutex<QueryState>,
    events: UnboundedSender<QueryEvent>,
}

impl<Q: QueryCapability> Shared<Q> {
    fn lock_state(&self) -> MutexGuard<'_, QueryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: QueryEvent) {
        // A closed receiver means nobody listens any more
        let _ = self.events.send(event);
    }

    /// Complete the cycle in flight, if any, as superseded.
    fn supersede(&self, state: &mut QueryState) {
        if state.interrupted {
            info!(
                "{} page {} superseded",
                self.capability.name(),
                state.page_offset
            );
            state.interrupted = false;
            self.emit(QueryEvent::Completed {
                page: state.page_offset,
                outcome: QueryOutcome::Superseded,
            });
        }
        state.generation += 1;
    }

    /// Emit the terminal event for `generation` if it is still current.
    fn complete(&self, generation: u64, outcome: QueryOutcome) {
        let mut state = self.lock_state();
        if state.generation != generation || !state.interrupted {
            return;
        }

        state.interrupted = false;
        info!(
            "{} page {} completed: {:?}",
            self.capability.name(),
            state.page_offset,
            outcome
        );
        self.emit(QueryEvent::Completed {
            page: state.page_offset,
            outcome,
        });
    }

    /// Parse a reply and emit its items, stopping early if superseded.
    ///
    /// Returns `None` when the cycle was superseded mid-parse.
    async fn parse_and_emit(
        &self,
        generation: u64,
        page: usize,
        reply: Result<Bytes>,
    ) -> Option<QueryOutcome> {
        let name = self.capability.name();

        let bytes = match reply {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("{} page {} transport error: {}", name, page, e);
                return Some(QueryOutcome::TransportError(e.to_string()));
            }
        };

        let mut text = String::from_utf8_lossy(&bytes).into_owned();
        if self.capability.repair_quotes() {
            text = text.replace('\'', "\"");
        }

        let body: Value = match serde_json::from_str(&text).map_err(MusicNetError::from) {
            Ok(body) => body,
            Err(e) => {
                warn!("{} page {} invalid JSON: {}", name, page, e);
                return Some(QueryOutcome::ParseError(e.to_string()));
            }
        };

        if !self.capability.is_success(&body) {
            warn!("{} page {} rejected by provider", name, page);
            return Some(QueryOutcome::ParseError(
                "missing provider success marker".to_string(),
            ));
        }

        {
            let mut state = self.lock_state();
            if state.generation != generation {
                return None;
            }
            state.page_total = self.capability.page_total(&body);
        }

        let mut emitted = 0;
        for raw in self.capability.items(&body) {
            // One item per scheduler turn so a newer request can cut in
            tokio::task::yield_now().await;

            if raw.is_null() {
                continue;
            }
            let Some(item) = self.capability.to_item(raw) else {
                continue;
            };

            {
                let state = self.lock_state();
                if state.generation != generation {
                    debug!("{} page {} stopped after {} items", name, page, emitted);
                    return None;
                }
                self.emit(QueryEvent::ItemDiscovered { page, item });
            }
            emitted += 1;
        }

        Some(if emitted == 0 {
            QueryOutcome::Empty
        } else {
            QueryOutcome::Success { items: emitted }
        })
    }
}

/// Per-cycle cleanup. Runs once, on completion, abort or cancellation.
struct CycleGuard<Q: QueryCapability> {
    shared: Arc<Shared<Q>>,
    generation: u64,
    released: bool,
}

impl<Q: QueryCapability> CycleGuard<Q> {
    fn new(shared: Arc<Shared<Q>>, generation: u64) -> Self {
        Self {
            shared,
            generation,
            released: false,
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let mut state = self.shared.lock_state();
        if state.generation == self.generation && state.code == StateCode::Querying {
            state.code = StateCode::Idle;
        }
        debug!(
            "{} cycle {} released",
            self.shared.capability.name(),
            self.generation
        );
    }
}

impl<Q: QueryCapability> Drop for CycleGuard<Q> {
    fn drop(&mut self) {
        self.release();
    }
}

async fn run_cycle<Q: QueryCapability, T: Transport>(
    shared: Arc<Shared<Q>>,
    transport: T,
    generation: u64,
) {
    let mut guard = CycleGuard::new(shared.clone(), generation);

    let (page, request) = {
        let state = shared.lock_state();
        if state.generation != generation || state.code != StateCode::Querying {
            return;
        }
        let page = PageRequest {
            search_text: &state.query_key,
            offset: state.page_offset,
            page_size: state.page_size,
        };
        (state.page_offset, shared.capability.build_request(&page))
    };

    let request = match request {
        Ok(request) => request,
        Err(e) => {
            warn!("{} failed to build request: {}", shared.capability.name(), e);
            shared.complete(generation, QueryOutcome::TransportError(e.to_string()));
            return;
        }
    };

    let reply = transport.execute(request).await;
    debug!("{} page {} reply received", shared.capability.name(), page);

    if let Some(outcome) = shared.parse_and_emit(generation, page, reply).await {
        shared.complete(generation, outcome);
    }
    guard.release();
}

/// One query instance: paging counters, the cycle in flight and its events.
///
/// Must be used from within a Tokio runtime; every page is fetched on a
/// spawned task.
pub struct QueryRequest<Q: QueryCapability, T: Transport> {
    shared: Arc<Shared<Q>>,
    transport: Option<T>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<Q: QueryCapability, T: Transport> QueryRequest<Q, T> {
    /// Create a request and the receiver its events arrive on.
    pub fn new(capability: Q, transport: T) -> (Self, UnboundedReceiver<QueryEvent>) {
        Self::build(capability, Some(transport))
    }

    /// Create a request with no transport. Page requests on it are ignored.
    pub fn detached(capability: Q) -> (Self, UnboundedReceiver<QueryEvent>) {
        Self::build(capability, None)
    }

    fn build(capability: Q, transport: Option<T>) -> (Self, UnboundedReceiver<QueryEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let state = QueryState {
            page_size: capability.default_page_size(),
            ..Default::default()
        };

        let request = Self {
            shared: Arc::new(Shared {
                capability,
                state: Mutex::new(state),
                events,
            }),
            transport,
            worker: Mutex::new(None),
        };
        (request, receiver)
    }

    /// Override the page size.
    pub fn with_page_size(self, page_size: usize) -> Self {
        self.shared.lock_state().page_size = page_size.max(1);
        self
    }

    /// The provider capability this request drives.
    pub fn capability(&self) -> &Q {
        &self.shared.capability
    }

    /// Start a new search for `term` at page 0.
    ///
    /// Runs the capability's auxiliary lookup first, if it has one. When the
    /// lookup finds nothing, a single `Completed { page: 0, Empty }` is
    /// emitted instead of a page fetch.
    pub async fn start_to_search(&self, term: &str) -> bool {
        let Some(transport) = &self.transport else {
            warn!("{} has no transport, search ignored", self.shared.capability.name());
            return false;
        };

        info!("{} start_to_search {}", self.shared.capability.name(), term);
        let resolved = self.shared.capability.resolve(transport, term).await;

        let key = match resolved {
            Ok(Some(key)) => key,
            Ok(None) => {
                self.finish_unstarted(term, QueryOutcome::Empty);
                return true;
            }
            Err(e) => {
                warn!("{} lookup failed: {}", self.shared.capability.name(), e);
                self.finish_unstarted(term, QueryOutcome::TransportError(e.to_string()));
                return true;
            }
        };

        {
            let mut state = self.shared.lock_state();
            state.search_text = term.to_string();
            state.query_key = key;
        }
        self.start_to_page(0)
    }

    fn finish_unstarted(&self, term: &str, outcome: QueryOutcome) {
        {
            let mut state = self.shared.lock_state();
            if state.code == StateCode::Cancelled {
                return;
            }
            self.shared.supersede(&mut state);
            state.search_text = term.to_string();
            state.query_key.clear();
            state.page_offset = 0;
            state.page_total = 0;
            state.code = StateCode::Idle;
            self.shared.emit(QueryEvent::Completed { page: 0, outcome });
        }
        self.abort_worker();
    }

    fn abort_worker(&self) {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = worker.take() {
            previous.abort();
        }
    }

    /// Fetch page `offset` for the current search, superseding any page in
    /// flight. Returns `false` (and does nothing) without a transport.
    pub fn start_to_page(&self, offset: usize) -> bool {
        let Some(transport) = self.transport.clone() else {
            warn!("{} has no transport, page ignored", self.shared.capability.name());
            return false;
        };

        let generation = {
            let mut state = self.shared.lock_state();
            if state.code == StateCode::Cancelled {
                return false;
            }
            self.shared.supersede(&mut state);
            state.page_offset = offset;
            state.page_total = 0;
            state.interrupted = true;
            state.code = StateCode::Querying;
            state.generation
        };

        info!("{} start_to_page {}", self.shared.capability.name(), offset);

        self.abort_worker();
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        *worker = Some(tokio::spawn(run_cycle(
            self.shared.clone(),
            transport,
            generation,
        )));
        true
    }

    /// Whether page `offset` exists according to the last reported total.
    ///
    /// Page 0 always exists. Stopping at the last page is the caller's job;
    /// `start_to_page` does not check this.
    pub fn has_page(&self, offset: usize) -> bool {
        let state = self.shared.lock_state();
        offset == 0 || offset * state.page_size < state.page_total
    }

    /// Snapshot of the paging state.
    pub fn state(&self) -> QueryState {
        self.shared.lock_state().clone()
    }

    pub fn search_text(&self) -> String {
        self.shared.lock_state().search_text.clone()
    }

    pub fn page_size(&self) -> usize {
        self.shared.lock_state().page_size
    }

    pub fn page_offset(&self) -> usize {
        self.shared.lock_state().page_offset
    }

    pub fn page_total(&self) -> usize {
        self.shared.lock_state().page_total
    }

    pub fn is_interrupted(&self) -> bool {
        self.shared.lock_state().interrupted
    }

    pub fn state_code(&self) -> StateCode {
        self.shared.lock_state().code
    }
}

impl<Q: QueryCapability, T: Transport> Drop for QueryRequest<Q, T> {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock_state();
            state.code = StateCode::Cancelled;
            state.interrupted = false;
            state.generation += 1;
        }
        let worker = self.worker.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = worker.take() {
            handle.abort();
        }
    }
}
