//! Lowest-bitrate download into the content-addressed cache.
//!
//! [`DownloadSelector`] picks a song's cheapest variant, fetches it on a
//! worker task and suspends the caller until the worker reports back.
//! Successful downloads are announced as [`DownloadCompleted`] events.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::cache::CacheNamer;
use crate::error::{MusicNetError, Result};
use crate::models::{SongItem, SongVariant};
use crate::transport::Transport;

/// Network reachability check supplied by the embedding application.
pub trait Reachability: Send + Sync {
    fn is_online(&self) -> bool;
}

impl<F: Fn() -> bool + Send + Sync> Reachability for F {
    fn is_online(&self) -> bool {
        self()
    }
}

/// Reachability that never reports an outage.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl Reachability for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// Announcement of one finished download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadCompleted {
    /// Keyed digest naming the cache file.
    pub cache_key: String,
    /// Duration hint as MM:SS.
    pub duration: String,
    /// Format of the fetched variant.
    pub format: String,
    /// Whether the caller asked for immediate playback.
    pub play_now: bool,
    /// Path to the cached file.
    pub path: PathBuf,
    /// Bytes written.
    pub size: u64,
}

/// The variant with the lowest bitrate; the earliest one wins ties.
pub fn select_variant(variants: &[SongVariant]) -> Option<&SongVariant> {
    variants.iter().min_by_key(|v| v.bitrate)
}

async fn discard_partial(partial: &Path) {
    if let Err(e) = tokio::fs::remove_file(partial).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove partial download {:?}: {}", partial, e);
        }
    }
}

/// Downloads songs into the cache.
pub struct DownloadSelector<T: Transport, R: Reachability> {
    transport: T,
    namer: CacheNamer,
    online: R,
    timeout: Option<Duration>,
    events: UnboundedSender<DownloadCompleted>,
}

impl<T: Transport, R: Reachability> DownloadSelector<T, R> {
    /// Create a selector and the receiver completions arrive on.
    pub fn new(
        transport: T,
        namer: CacheNamer,
        online: R,
    ) -> (Self, UnboundedReceiver<DownloadCompleted>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let selector = Self {
            transport,
            namer,
            online,
            timeout: None,
            events,
        };
        (selector, receiver)
    }

    /// Bound every transfer; `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The namer deciding cache paths.
    pub fn namer(&self) -> &CacheNamer {
        &self.namer
    }

    /// Download the lowest-bitrate variant of `song` and announce it.
    ///
    /// Returns `false` when offline, when the song has no variants or when
    /// the transfer fails; nothing is announced in those cases.
    pub async fn select_and_download(&self, song: &SongItem, play_now: bool) -> bool {
        match self.try_download(song, play_now).await {
            Ok(completed) => {
                let _ = self.events.send(completed);
                true
            }
            Err(e) => {
                warn!("Download of {} failed: {}", song.identity(), e);
                false
            }
        }
    }

    /// Download `songs` one after another. Only the first asks for
    /// immediate playback. Returns how many succeeded.
    pub async fn download_batch(&self, songs: &[SongItem]) -> usize {
        let mut successful = 0;
        for (idx, song) in songs.iter().enumerate() {
            if self.select_and_download(song, idx == 0).await {
                successful += 1;
            }
        }
        info!("Batch finished: {}/{} downloaded", successful, songs.len());
        successful
    }

    /// Same as [`select_and_download`](Self::select_and_download) but
    /// returns the completion or the reason it failed, without announcing.
    pub async fn try_download(&self, song: &SongItem, play_now: bool) -> Result<DownloadCompleted> {
        if !self.online.is_online() {
            return Err(MusicNetError::Offline);
        }

        let variant = select_variant(&song.variants)
            .ok_or_else(|| MusicNetError::NoVariants(song.identity()))?;

        let cache_key = self.namer.cache_key(&song.artist, &song.title)?;
        let path = self.namer.dir().join(format!("{}.{}", cache_key, variant.format));
        tokio::fs::create_dir_all(self.namer.dir()).await?;

        debug!(
            "Selected {} kbps {} of {} -> {:?}",
            variant.bitrate,
            variant.format,
            song.identity(),
            path
        );

        // The cache path only ever holds complete transfers
        let partial = path.with_file_name(format!("{}.{}.part", cache_key, variant.format));

        let (done_tx, done_rx) = oneshot::channel();
        let transport = self.transport.clone();
        let url = variant.url.clone();
        let target = partial.clone();
        let worker = tokio::spawn(async move {
            let result = transport.download(&url, &target).await;
            let _ = done_tx.send(result);
        });

        let finished = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, done_rx).await {
                Ok(finished) => finished,
                Err(_) => {
                    worker.abort();
                    let _ = worker.await;
                    discard_partial(&partial).await;
                    return Err(MusicNetError::Timeout(limit));
                }
            },
            None => done_rx.await,
        };
        let size = match finished
            .map_err(|_| MusicNetError::Cancelled("download worker stopped".to_string()))
            .and_then(|result| result)
        {
            Ok(size) => size,
            Err(e) => {
                discard_partial(&partial).await;
                return Err(e);
            }
        };
        tokio::fs::rename(&partial, &path).await?;

        info!("Downloaded {} ({} bytes) to {:?}", song.identity(), size, path);

        Ok(DownloadCompleted {
            cache_key,
            duration: song.duration_formatted(),
            format: variant.format.clone(),
            play_now,
            path,
            size,
        })
    }
}
