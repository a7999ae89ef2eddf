//! Speculative loading of upcoming months
//!
//! A [`PrefetchCache`] owns one [`PrefetchJob`] per month, the fetches those
//! jobs started, and a bounded memory of URLs known to be loaded. Jobs are
//! stamped with the prefetch token and the view signature they were planned
//! for; bumping the token makes every outstanding job stale.

use crate::core::constants::PREFETCH_CACHE_MAX_URLS;
use crate::core::month::Month;
use crate::prelude::{HashMap, HashSet};
use crate::tiles::loader::{FetchCompletion, FetchId, FetchOutcome, TileFetcher};
use crate::tiles::sampler::ViewSignature;
use std::collections::VecDeque;

/// URLs that finished loading, forgotten oldest-first beyond capacity
#[derive(Debug, Clone)]
pub struct LoadedUrls {
    urls: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl LoadedUrls {
    pub fn new(capacity: usize) -> Self {
        Self {
            urls: HashSet::default(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    /// Records a URL; re-inserting a known URL does not refresh its age
    pub fn insert(&mut self, url: &str) {
        if url.is_empty() || self.urls.contains(url) {
            return;
        }
        self.urls.insert(url.to_string());
        self.order.push_back(url.to_string());
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.urls.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for LoadedUrls {
    fn default() -> Self {
        Self::new(PREFETCH_CACHE_MAX_URLS)
    }
}

/// Outstanding speculative loads for one month
#[derive(Debug, Clone, PartialEq)]
pub struct PrefetchJob {
    pub token: u64,
    pub view: ViewSignature,
    pub fetches: Vec<FetchId>,
    pub remaining: usize,
}

#[derive(Debug, Clone)]
struct InFlight {
    month: Month,
    url: String,
    token: u64,
}

#[derive(Debug)]
pub struct PrefetchCache {
    jobs: HashMap<Month, PrefetchJob>,
    in_flight: HashMap<FetchId, InFlight>,
    loaded: LoadedUrls,
    token: u64,
    next_fetch_id: u64,
}

impl PrefetchCache {
    pub fn new(max_urls: usize) -> Self {
        Self {
            jobs: HashMap::default(),
            in_flight: HashMap::default(),
            loaded: LoadedUrls::new(max_urls),
            token: 0,
            next_fetch_id: 1,
        }
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    /// Makes sure jobs are never stamped with token zero
    pub fn ensure_token(&mut self) -> u64 {
        if self.token == 0 {
            self.token = 1;
        }
        self.token
    }

    pub fn is_loaded(&self, url: &str) -> bool {
        self.loaded.contains(url)
    }

    pub fn mark_loaded(&mut self, url: &str) {
        self.loaded.insert(url);
    }

    pub fn loaded(&self) -> &LoadedUrls {
        &self.loaded
    }

    pub fn job(&self, month: Month) -> Option<&PrefetchJob> {
        self.jobs.get(&month)
    }

    /// Months with a live job, oldest month first
    pub fn job_months(&self) -> Vec<Month> {
        let mut months: Vec<Month> = self.jobs.keys().copied().collect();
        months.sort();
        months
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether `month` already has a job planned under `token` for `view`
    pub fn covers(&self, month: Month, token: u64, view: &ViewSignature) -> bool {
        self.jobs
            .get(&month)
            .map(|job| job.token == token && job.view == *view)
            .unwrap_or(false)
    }

    /// Replaces the job for `month` with loads of `urls`.
    ///
    /// URLs already loaded count as done immediately; the job is dropped
    /// as soon as nothing remains outstanding.
    pub fn begin_job<F>(&mut self, month: Month, token: u64, view: ViewSignature, urls: &[String], fetcher: &mut F)
    where
        F: TileFetcher + ?Sized,
    {
        if urls.is_empty() {
            return;
        }
        self.cancel_month(month, fetcher);

        let mut job = PrefetchJob {
            token,
            view,
            fetches: Vec::new(),
            remaining: urls.len(),
        };
        for url in urls {
            if self.loaded.contains(url) {
                job.remaining -= 1;
                continue;
            }
            let id = FetchId(self.next_fetch_id);
            self.next_fetch_id += 1;
            self.in_flight.insert(id, InFlight { month, url: url.clone(), token });
            job.fetches.push(id);
            fetcher.start(id, url);
        }

        log::debug!(
            "prefetch {}: {} urls, {} started (token {})",
            month,
            urls.len(),
            job.fetches.len(),
            token
        );
        if job.remaining > 0 {
            self.jobs.insert(month, job);
        }
    }

    /// Applies one fetch outcome; completions for aborted fetches are ignored
    pub fn complete(&mut self, completion: &FetchCompletion) {
        let Some(flight) = self.in_flight.remove(&completion.id) else {
            return;
        };
        match &completion.outcome {
            FetchOutcome::Loaded { url } => {
                self.loaded.insert(&flight.url);
                if *url != flight.url {
                    self.loaded.insert(url);
                }
            }
            FetchOutcome::Errored(reason) => {
                log::debug!("prefetch miss {}: {}", flight.url, reason);
            }
            FetchOutcome::Canceled => {}
        }

        let finished = match self.jobs.get_mut(&flight.month) {
            Some(job) if job.token == flight.token => {
                job.fetches.retain(|id| *id != completion.id);
                job.remaining = job.remaining.saturating_sub(1);
                job.remaining == 0
            }
            _ => false,
        };
        if finished {
            self.jobs.remove(&flight.month);
        }
    }

    fn abort_job<F>(&mut self, job: PrefetchJob, fetcher: &mut F)
    where
        F: TileFetcher + ?Sized,
    {
        for id in job.fetches {
            self.in_flight.remove(&id);
            if let Err(e) = fetcher.abort(id) {
                log::trace!("ignoring prefetch abort failure: {}", e);
            }
        }
    }

    /// Tears down the job for one month
    pub fn cancel_month<F>(&mut self, month: Month, fetcher: &mut F)
    where
        F: TileFetcher + ?Sized,
    {
        if let Some(job) = self.jobs.remove(&month) {
            self.abort_job(job, fetcher);
        }
    }

    /// Tears down every job whose month is not in `keep`.
    ///
    /// Without a keep-set all jobs go and the token is bumped so that
    /// nothing planned earlier can be mistaken for current work.
    pub fn cancel<F>(&mut self, keep: Option<&HashSet<Month>>, fetcher: &mut F)
    where
        F: TileFetcher + ?Sized,
    {
        let doomed: Vec<Month> = self
            .jobs
            .keys()
            .filter(|month| keep.map(|keep| !keep.contains(*month)).unwrap_or(true))
            .copied()
            .collect();
        for month in doomed {
            self.cancel_month(month, fetcher);
        }
        if keep.is_none() {
            self.token += 1;
        }
    }
}

impl Default for PrefetchCache {
    fn default() -> Self {
        Self::new(PREFETCH_CACHE_MAX_URLS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::loader::DeferredFetcher;

    fn m(s: &str) -> Month {
        s.parse().unwrap()
    }

    fn urls(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| format!("https://t/{name}.png")).collect()
    }

    fn view() -> ViewSignature {
        ViewSignature::default()
    }

    #[test]
    fn test_loaded_urls_evict_oldest_first() {
        let mut loaded = LoadedUrls::new(2);
        loaded.insert("a");
        loaded.insert("b");
        loaded.insert("a");
        loaded.insert("c");
        assert!(!loaded.contains("a"));
        assert!(loaded.contains("b"));
        assert!(loaded.contains("c"));
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn test_job_completes_and_is_removed() {
        let mut cache = PrefetchCache::default();
        let mut fetcher = DeferredFetcher::new();
        let token = cache.ensure_token();
        cache.begin_job(m("2000-02"), token, view(), &urls(&["a", "b"]), &mut fetcher);
        assert_eq!(cache.job(m("2000-02")).map(|job| job.remaining), Some(2));
        assert!(cache.covers(m("2000-02"), token, &view()));

        fetcher.complete_url("https://t/a.png", true);
        fetcher.complete_url("https://t/b.png", false);
        for completion in fetcher.poll_completed() {
            cache.complete(&completion);
        }
        assert!(cache.job(m("2000-02")).is_none());
        assert!(cache.is_loaded("https://t/a.png"));
        assert!(!cache.is_loaded("https://t/b.png"));
        assert_eq!(cache.in_flight(), 0);
    }

    #[test]
    fn test_already_loaded_urls_start_nothing() {
        let mut cache = PrefetchCache::default();
        let mut fetcher = DeferredFetcher::new();
        cache.mark_loaded("https://t/a.png");
        cache.begin_job(m("2000-02"), 1, view(), &urls(&["a"]), &mut fetcher);
        assert!(cache.job(m("2000-02")).is_none());
        assert_eq!(fetcher.started_total(), 0);
    }

    #[test]
    fn test_cancel_without_keep_aborts_and_bumps_token() {
        let mut cache = PrefetchCache::default();
        let mut fetcher = DeferredFetcher::new();
        let token = cache.ensure_token();
        cache.begin_job(m("2000-02"), token, view(), &urls(&["a"]), &mut fetcher);
        cache.begin_job(m("2000-03"), token, view(), &urls(&["b"]), &mut fetcher);

        let keep: HashSet<Month> = [m("2000-03")].into_iter().collect();
        cache.cancel(Some(&keep), &mut fetcher);
        assert_eq!(cache.job_months(), vec![m("2000-03")]);
        assert_eq!(cache.token(), token);

        cache.cancel(None, &mut fetcher);
        assert!(cache.job_months().is_empty());
        assert_eq!(cache.token(), token + 1);
        assert_eq!(fetcher.aborted().len(), 2);
        assert!(fetcher.open_requests().is_empty());
    }

    #[test]
    fn test_late_completion_after_cancel_is_ignored() {
        let mut cache = PrefetchCache::default();
        let mut fetcher = DeferredFetcher::new();
        cache.begin_job(m("2000-02"), 1, view(), &urls(&["a"]), &mut fetcher);
        let id = fetcher.open_requests()[0].0;
        cache.cancel(None, &mut fetcher);

        cache.complete(&FetchCompletion {
            id,
            outcome: FetchOutcome::Loaded { url: "https://t/a.png".into() },
        });
        assert!(!cache.is_loaded("https://t/a.png"));
    }

    #[test]
    fn test_replacing_a_job_aborts_previous_fetches() {
        let mut cache = PrefetchCache::default();
        let mut fetcher = DeferredFetcher::new();
        cache.begin_job(m("2000-02"), 1, view(), &urls(&["a", "b"]), &mut fetcher);
        cache.begin_job(m("2000-02"), 2, view(), &urls(&["c"]), &mut fetcher);
        assert_eq!(fetcher.aborted().len(), 2);
        assert_eq!(fetcher.open_urls(), vec!["https://t/c.png".to_string()]);
        assert_eq!(cache.job(m("2000-02")).map(|job| job.token), Some(2));
    }
}
