//! Fire-and-forget tile fetching
//!
//! The viewer never awaits a fetch. It starts one under a [`FetchId`], may
//! abort it later, and learns about outcomes when the host drains
//! [`TileFetcher::poll_completed`]. Any completion whose id is no longer
//! tracked by the caller is simply ignored.

use crate::{Result, ViewerError};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Identity of one speculative load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FetchId(pub u64);

/// How a fetch ended
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Bytes arrived; `url` is the final URL after redirects
    Loaded { url: String },
    Errored(String),
    Canceled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchCompletion {
    pub id: FetchId,
    pub outcome: FetchOutcome,
}

/// Capability to load tile images speculatively
pub trait TileFetcher {
    /// Start loading `url`; the outcome is reported later under `id`
    fn start(&mut self, id: FetchId, url: &str);

    /// Best-effort abort. Callers swallow the error.
    fn abort(&mut self, id: FetchId) -> Result<()>;

    /// Outcomes that arrived since the last poll
    fn poll_completed(&mut self) -> Vec<FetchCompletion>;
}

/// Fetcher whose requests are fulfilled by the host
///
/// Useful when the embedding application already owns an image loader, and
/// for driving the viewer deterministically in tests.
#[derive(Debug, Default)]
pub struct DeferredFetcher {
    open: Vec<(FetchId, String)>,
    aborted: Vec<FetchId>,
    completed: VecDeque<FetchCompletion>,
    started_total: usize,
}

impl DeferredFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests started and neither completed nor aborted
    pub fn open_requests(&self) -> &[(FetchId, String)] {
        &self.open
    }

    pub fn open_urls(&self) -> Vec<String> {
        self.open.iter().map(|(_, url)| url.clone()).collect()
    }

    pub fn aborted(&self) -> &[FetchId] {
        &self.aborted
    }

    pub fn started_total(&self) -> usize {
        self.started_total
    }

    /// Resolves an open request; returns false if `id` is not open
    pub fn complete(&mut self, id: FetchId, outcome: FetchOutcome) -> bool {
        let Some(pos) = self.open.iter().position(|(open, _)| *open == id) else {
            return false;
        };
        self.open.remove(pos);
        self.completed.push_back(FetchCompletion { id, outcome });
        true
    }

    /// Resolves every open request for `url`; returns how many were resolved
    pub fn complete_url(&mut self, url: &str, loaded: bool) -> usize {
        let ids: Vec<FetchId> = self
            .open
            .iter()
            .filter(|(_, open_url)| open_url == url)
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            let outcome = if loaded {
                FetchOutcome::Loaded { url: url.to_string() }
            } else {
                FetchOutcome::Errored(format!("failed to load {url}"))
            };
            self.complete(*id, outcome);
        }
        ids.len()
    }

    /// Resolves every open request as loaded
    pub fn complete_all(&mut self) -> usize {
        let open: Vec<(FetchId, String)> = self.open.clone();
        for (id, url) in &open {
            self.complete(*id, FetchOutcome::Loaded { url: url.clone() });
        }
        open.len()
    }
}

impl TileFetcher for DeferredFetcher {
    fn start(&mut self, id: FetchId, url: &str) {
        self.started_total += 1;
        self.open.push((id, url.to_string()));
    }

    fn abort(&mut self, id: FetchId) -> Result<()> {
        let Some(pos) = self.open.iter().position(|(open, _)| *open == id) else {
            return Err(ViewerError::Fetch(format!("fetch {} is not in flight", id.0)));
        };
        self.open.remove(pos);
        self.aborted.push(id);
        Ok(())
    }

    fn poll_completed(&mut self) -> Vec<FetchCompletion> {
        self.completed.drain(..).collect()
    }
}

#[cfg(feature = "tokio-runtime")]
pub use http::HttpTileFetcher;

#[cfg(feature = "tokio-runtime")]
mod http {
    use super::*;
    use crate::prelude::HashMap;
    use crossbeam_channel::{unbounded, Receiver, Sender};
    use futures::future::{AbortHandle, Abortable};
    use once_cell::sync::Lazy;

    /// Shared async HTTP client for tile fetching
    pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
        reqwest::Client::builder()
            .user_agent("chronotile/0.1.0")
            .timeout(std::time::Duration::from_secs(30))
            .pool_max_idle_per_host(16)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    });

    async fn download(url: String) -> Result<String> {
        let response = HTTP_CLIENT.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ViewerError::Fetch(format!("HTTP {} for {}", response.status(), url)));
        }
        let final_url = response.url().to_string();
        response.bytes().await?;
        Ok(final_url)
    }

    /// Fetches tiles on a tokio runtime; completions come back over a channel
    pub struct HttpTileFetcher {
        runtime: tokio::runtime::Handle,
        tx: Sender<FetchCompletion>,
        rx: Receiver<FetchCompletion>,
        in_flight: HashMap<FetchId, AbortHandle>,
    }

    impl HttpTileFetcher {
        pub fn new(runtime: tokio::runtime::Handle) -> Self {
            let (tx, rx) = unbounded();
            Self {
                runtime,
                tx,
                rx,
                in_flight: HashMap::default(),
            }
        }

        /// Uses the runtime of the calling context
        pub fn current() -> Result<Self> {
            let handle = tokio::runtime::Handle::try_current()
                .map_err(|e| ViewerError::Fetch(format!("no tokio runtime: {e}")))?;
            Ok(Self::new(handle))
        }

        pub fn in_flight(&self) -> usize {
            self.in_flight.len()
        }
    }

    impl TileFetcher for HttpTileFetcher {
        fn start(&mut self, id: FetchId, url: &str) {
            let (abort_handle, registration) = AbortHandle::new_pair();
            let tx = self.tx.clone();
            let url = url.to_string();
            self.in_flight.insert(id, abort_handle);
            self.runtime.spawn(async move {
                let outcome = match Abortable::new(download(url.clone()), registration).await {
                    Ok(Ok(final_url)) => FetchOutcome::Loaded { url: final_url },
                    Ok(Err(e)) => {
                        log::warn!("prefetch of {} failed: {}", url, e);
                        FetchOutcome::Errored(e.to_string())
                    }
                    Err(_aborted) => FetchOutcome::Canceled,
                };
                let _ = tx.send(FetchCompletion { id, outcome });
            });
        }

        fn abort(&mut self, id: FetchId) -> Result<()> {
            match self.in_flight.remove(&id) {
                Some(handle) => {
                    handle.abort();
                    Ok(())
                }
                None => Err(ViewerError::Fetch(format!("fetch {} is not in flight", id.0))),
            }
        }

        fn poll_completed(&mut self) -> Vec<FetchCompletion> {
            let completed: Vec<FetchCompletion> = self.rx.try_iter().collect();
            for completion in &completed {
                self.in_flight.remove(&completion.id);
            }
            completed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deferred_fetcher_lifecycle() {
        let mut fetcher = DeferredFetcher::new();
        fetcher.start(FetchId(1), "https://t/a.png");
        fetcher.start(FetchId(2), "https://t/b.png");
        fetcher.start(FetchId(3), "https://t/c.png");
        assert_eq!(fetcher.open_requests().len(), 3);

        assert!(fetcher.abort(FetchId(2)).is_ok());
        assert!(fetcher.abort(FetchId(2)).is_err());
        assert_eq!(fetcher.aborted(), &[FetchId(2)]);

        assert_eq!(fetcher.complete_url("https://t/a.png", true), 1);
        assert!(fetcher.complete(FetchId(3), FetchOutcome::Errored("404".into())));
        assert!(!fetcher.complete(FetchId(3), FetchOutcome::Canceled));

        let completed = fetcher.poll_completed();
        assert_eq!(completed.len(), 2);
        assert_eq!(completed[0].outcome, FetchOutcome::Loaded { url: "https://t/a.png".into() });
        assert!(fetcher.poll_completed().is_empty());
        assert_eq!(fetcher.started_total(), 3);
    }

    #[cfg(feature = "tokio-runtime")]
    #[tokio::test]
    async fn test_http_fetcher_abort_reports_cancel_or_nothing() {
        let mut fetcher = HttpTileFetcher::current().unwrap();
        // unroutable address so the request cannot finish before the abort
        fetcher.start(FetchId(7), "http://10.255.255.1/0/0/0.png");
        assert_eq!(fetcher.in_flight(), 1);
        assert!(fetcher.abort(FetchId(7)).is_ok());
        assert!(fetcher.abort(FetchId(7)).is_err());

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        for completion in fetcher.poll_completed() {
            assert_eq!(completion.id, FetchId(7));
            assert_eq!(completion.outcome, FetchOutcome::Canceled);
        }
        assert_eq!(fetcher.in_flight(), 0);
    }
}
