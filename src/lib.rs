//! # musicnet
//!
//! Paged metadata queries and cached downloads over unofficial
//! music-service APIs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use musicnet::{HttpTransport, Provider, ProviderQuery, QueryEvent, QueryKind, QueryRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = HttpTransport::new(musicnet::config::DEFAULT_USER_AGENT)?;
//!     let query = ProviderQuery::new(Provider::Kw, QueryKind::Songs)?;
//!     let (request, mut events) = QueryRequest::new(query, transport);
//!
//!     request.start_to_search("Yesterday").await;
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             QueryEvent::ItemDiscovered { item, .. } => println!("{:?}", item),
//!             QueryEvent::Completed { outcome, .. } => {
//!                 println!("done: {:?}", outcome);
//!                 break;
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Components
//!
//! - [`QueryRequest`] - per-query paging state machine emitting [`QueryEvent`]s
//! - [`providers`] - KW and WY query implementations
//! - [`DownloadSelector`] - lowest-bitrate download into the cache
//! - [`CacheNamer`] - keyed, content-addressed cache file names
//! - [`ConnectionPool`] - registry relaying messages between components

pub mod cache;
pub mod config;
pub mod crypto;
pub mod download;
pub mod error;
pub mod models;
pub mod pool;
pub mod providers;
pub mod query;
pub mod transport;

pub use cache::CacheNamer;
pub use config::Config;
pub use download::{
    select_variant, AlwaysOnline, DownloadCompleted, DownloadSelector, Reachability,
};
pub use error::{MusicNetError, Result};
pub use models::{AlbumItem, ArtistItem, CommentItem, ResultItem, SongItem, SongVariant};
pub use pool::{pool_name, ConnectionPool, PoolMember};
pub use providers::{Provider, ProviderQuery, QueryKind};
pub use query::{QueryCapability, QueryEvent, QueryOutcome, QueryRequest, QueryState, StateCode};
pub use transport::{HttpTransport, ProviderRequest, Transport};
