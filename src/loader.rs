//! Tile image loading
//!
//! - `ImageLoader`: concurrency governor owned by the render thread
//! - `ImageFetcher`: performs one fetch and reports through a `CompletionSink`
//! - `AsyncFetcher`: tokio + reqwest fetcher, decode on `spawn_blocking`
//!
//! Completions cross back to the render thread over an mpsc channel and are
//! drained once per tick, so the drawer is only ever mutated by its owner.

use crate::source::is_remote;
use crate::tile::{Bitmap, TileKey};
use std::sync::mpsc;
use std::time::Duration;
use tokio::runtime::Handle;

/// Fetch failures, collapsed to a missing bitmap before reaching the drawer
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("decode task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("timed out after {0} ms")]
    Timeout(u64),
}

/// One requested tile image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageJob {
    pub key: TileKey,
    pub url: String,
    /// Frame time the request was issued
    pub issued_at: f64,
    /// Drawer epoch the request belongs to; bumped on every reset
    pub epoch: u64,
}

/// Outcome of a job; `bitmap` is `None` on failure or timeout
#[derive(Debug, Clone)]
pub struct ImageCompletion {
    pub key: TileKey,
    pub url: String,
    pub issued_at: f64,
    pub epoch: u64,
    pub bitmap: Option<Bitmap>,
}

/// Where a fetcher reports a finished job. Safe to move across threads.
#[derive(Debug, Clone)]
pub struct CompletionSink(mpsc::Sender<ImageCompletion>);

impl CompletionSink {
    pub fn complete(&self, job: ImageJob, bitmap: Option<Bitmap>) {
        let completion = ImageCompletion {
            key: job.key,
            url: job.url,
            issued_at: job.issued_at,
            epoch: job.epoch,
            bitmap,
        };
        // the loader is gone, nobody wants the tile anymore
        if self.0.send(completion).is_err() {
            tracing::debug!("Dropping completion for {}: loader closed", job.key);
        }
    }
}

/// Performs a single fetch. Every accepted job must eventually be reported
/// through the sink exactly once.
pub trait ImageFetcher: Send {
    fn fetch(&self, job: ImageJob, sink: CompletionSink);
}

/// Bounded-concurrency front of an `ImageFetcher`
pub struct ImageLoader {
    /// Max outstanding jobs, 0 = unbounded
    limit: usize,
    downloading: usize,
    fetcher: Box<dyn ImageFetcher>,
    sender: mpsc::Sender<ImageCompletion>,
    receiver: mpsc::Receiver<ImageCompletion>,
}

impl ImageLoader {
    pub fn new(limit: usize, fetcher: impl ImageFetcher + 'static) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            limit,
            downloading: 0,
            fetcher: Box::new(fetcher),
            sender,
            receiver,
        }
    }

    /// Start a job unless the limit is reached. Returns whether it started.
    pub fn load_image(&mut self, job: ImageJob) -> bool {
        if self.limit != 0 && self.downloading >= self.limit {
            tracing::debug!("Loader busy ({} outstanding), deferring {}", self.downloading, job.key);
            return false;
        }
        self.downloading += 1;
        self.fetcher.fetch(job, CompletionSink(self.sender.clone()));
        true
    }

    /// Take every completion that has arrived so far
    pub fn drain(&mut self) -> Vec<ImageCompletion> {
        let completions: Vec<_> = self.receiver.try_iter().collect();
        self.downloading = self.downloading.saturating_sub(completions.len());
        completions
    }

    pub fn downloading(&self) -> usize {
        self.downloading
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn is_idle(&self) -> bool {
        self.downloading == 0
    }
}

/// Fetches local paths with tokio and http(s) URLs with reqwest
pub struct AsyncFetcher {
    handle: Handle,
    client: reqwest::Client,
    timeout: Duration,
}

impl AsyncFetcher {
    pub fn new(handle: Handle, timeout_ms: u64) -> Result<Self, LoadError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            handle,
            client,
            timeout: Duration::from_millis(timeout_ms),
        })
    }

    /// Fetcher bound to the runtime of the calling task
    pub fn current(timeout_ms: u64) -> Result<Self, LoadError> {
        Self::new(Handle::current(), timeout_ms)
    }
}

impl ImageFetcher for AsyncFetcher {
    fn fetch(&self, job: ImageJob, sink: CompletionSink) {
        let client = self.client.clone();
        let timeout = self.timeout;

        self.handle.spawn(async move {
            let result = match tokio::time::timeout(timeout, fetch_bitmap(&client, &job.url)).await {
                Ok(result) => result,
                Err(_) => Err(LoadError::Timeout(timeout.as_millis() as u64)),
            };
            let bitmap = match result {
                Ok(bitmap) => Some(bitmap),
                Err(e) => {
                    tracing::debug!("Tile {} failed: {}", job.key, e);
                    None
                }
            };
            sink.complete(job, bitmap);
        });
    }
}

async fn fetch_bitmap(client: &reqwest::Client, url: &str) -> Result<Bitmap, LoadError> {
    let bytes = if is_remote(url) {
        let response = client.get(url).send().await?.error_for_status()?;
        response.bytes().await?.to_vec()
    } else {
        tokio::fs::read(url).await.map_err(|source| LoadError::Io { url: url.to_string(), source })?
    };

    // decode off the async workers
    let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes)).await??;
    Ok(Bitmap::new(image.to_rgba8()))
}

/// Fetchers driven by hand from tests
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records jobs; tests decide when and how each finishes
    #[derive(Clone, Default)]
    pub struct ManualFetcher {
        pending: Arc<Mutex<Vec<(ImageJob, CompletionSink)>>>,
    }

    impl ManualFetcher {
        pub fn pending_keys(&self) -> Vec<TileKey> {
            self.pending.lock().unwrap().iter().map(|(job, _)| job.key).collect()
        }

        /// Finish every pending job, successfully when `ok`
        pub fn complete_all(&self, ok: bool) -> usize {
            let jobs: Vec<_> = self.pending.lock().unwrap().drain(..).collect();
            let count = jobs.len();
            for (job, sink) in jobs {
                let bitmap = ok.then(|| Bitmap::filled(4, 4, [200, 100, 50, 255]));
                sink.complete(job, bitmap);
            }
            count
        }

        /// Finish one job by key
        pub fn complete(&self, key: TileKey, ok: bool) -> bool {
            let mut pending = self.pending.lock().unwrap();
            let Some(index) = pending.iter().position(|(job, _)| job.key == key) else {
                return false;
            };
            let (job, sink) = pending.remove(index);
            drop(pending);
            sink.complete(job, ok.then(|| Bitmap::filled(4, 4, [200, 100, 50, 255])));
            true
        }
    }

    impl ImageFetcher for ManualFetcher {
        fn fetch(&self, job: ImageJob, sink: CompletionSink) {
            self.pending.lock().unwrap().push((job, sink));
        }
    }

    /// Completes every job immediately with a solid bitmap
    #[derive(Clone, Copy, Default)]
    pub struct InstantFetcher;

    impl ImageFetcher for InstantFetcher {
        fn fetch(&self, job: ImageJob, sink: CompletionSink) {
            sink.complete(job, Some(Bitmap::filled(4, 4, [90, 90, 90, 255])));
        }
    }
}
