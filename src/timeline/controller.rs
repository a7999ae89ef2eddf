//! The month viewer's single owner of state
//!
//! [`ViewerController`] holds the [`ViewerState`], the collaborators it
//! drives, and the event loop its deferred work is queued on. The host feeds
//! it time ([`advance`](ViewerController::advance),
//! [`render_frame`](ViewerController::render_frame)), tile events, fetch
//! completions, view changes and user commands; every entry point runs to
//! completion before returning.

use crate::core::config::ViewerConfig;
use crate::core::manifest::TimeSeriesSource;
use crate::core::month::{Month, MonthSequence};
use crate::layers::cache::LayerCache;
use crate::layers::surface::MapSurface;
use crate::prelude::HashSet;
use crate::runtime::{EventLoop, TimerId};
use crate::tiles::loader::TileFetcher;
use crate::tiles::prefetch::PrefetchCache;
use crate::tiles::sampler::{ViewSampler, ViewSignature};
use crate::tiles::source::UrlTemplate;
use crate::timeline::transition::PendingTransition;
use crate::ui::{ViewerCommand, ViewerUi};

/// Deferred work. Every variant carrying a token is discarded when the
/// token is no longer current.
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    /// Map was not ready; ask again next frame
    RetryRequest { index: i64 },
    PostStartEvaluate { token: u64 },
    Watchdog { token: u64 },
    /// Frames still to wait before the crossfade starts
    AwaitPaint { token: u64, frames_left: u32 },
    FadeStep { token: u64 },
    DetachPrevious { token: u64, previous: Month },
    PlaybackTick,
    /// Re-request a pending month after the view settled elsewhere
    RestartTransition { index: usize },
}

/// Playback is waiting on `month` to be fully prefetched since `start_ms`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Buffering {
    pub month: Month,
    pub start_ms: f64,
}

/// Everything the viewer knows
#[derive(Debug)]
pub struct ViewerState {
    pub(super) months: MonthSequence,
    pub(super) template: UrlTemplate,
    /// Last committed index
    pub(super) current_index: Option<usize>,
    /// Index shown on the controls
    pub(super) requested_index: Option<usize>,
    pub(super) playing: bool,
    pub(super) fps: f64,
    pub(super) visible: Option<Month>,
    pub(super) pending: Option<PendingTransition>,
    pub(super) layers: LayerCache,
    pub(super) prefetch: PrefetchCache,
    pub(super) view_signature: ViewSignature,
    pub(super) transition_token: u64,
    pub(super) playback_timer: Option<TimerId>,
    pub(super) buffering: Option<Buffering>,
}

impl ViewerState {
    pub fn months(&self) -> &MonthSequence {
        &self.months
    }

    pub fn template(&self) -> &UrlTemplate {
        &self.template
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn requested_index(&self) -> Option<usize> {
        self.requested_index
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Month of the layer currently shown to the user
    pub fn visible_month(&self) -> Option<Month> {
        self.visible
    }

    pub fn pending(&self) -> Option<&PendingTransition> {
        self.pending.as_ref()
    }

    pub fn layers(&self) -> &LayerCache {
        &self.layers
    }

    pub fn prefetch(&self) -> &PrefetchCache {
        &self.prefetch
    }

    pub fn view_signature(&self) -> &ViewSignature {
        &self.view_signature
    }

    pub fn transition_token(&self) -> u64 {
        self.transition_token
    }

    pub fn playback_timer(&self) -> Option<TimerId> {
        self.playback_timer
    }

    pub fn buffering(&self) -> Option<Buffering> {
        self.buffering
    }
}

pub struct ViewerController<S, F, U> {
    pub(super) config: ViewerConfig,
    pub(super) sampler: ViewSampler,
    pub(super) surface: S,
    pub(super) fetcher: F,
    pub(super) ui: U,
    pub(super) state: ViewerState,
    pub(super) events: EventLoop<Task>,
}

impl<S, F, U> ViewerController<S, F, U>
where
    S: MapSurface,
    F: TileFetcher,
    U: ViewerUi,
{
    pub fn new(source: TimeSeriesSource, config: ViewerConfig, surface: S, fetcher: F, ui: U) -> Self {
        let sampler = ViewSampler::new(source.min_zoom, source.max_zoom, config.tile_size);
        let state = ViewerState {
            months: source.months,
            template: source.template,
            current_index: None,
            requested_index: None,
            playing: false,
            fps: config.clamp_fps(config.default_fps),
            visible: None,
            pending: None,
            layers: LayerCache::new(),
            prefetch: PrefetchCache::new(config.prefetch_cache_max_urls),
            view_signature: ViewSignature::default(),
            transition_token: 0,
            playback_timer: None,
            buffering: None,
        };
        Self {
            config,
            sampler,
            surface,
            fetcher,
            ui,
            state,
            events: EventLoop::new(),
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn fetcher_mut(&mut self) -> &mut F {
        &mut self.fetcher
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    pub fn events(&self) -> &EventLoop<Task> {
        &self.events
    }

    pub fn now(&self) -> f64 {
        self.events.now()
    }

    /// Runs every timer due at or before `now_ms`, in due order
    pub fn advance(&mut self, now_ms: f64) {
        self.pump_fetches();
        while let Some(task) = self.events.pop_due(now_ms) {
            let now = self.events.now();
            self.run_task(task, now);
        }
        self.events.set_now(now_ms);
    }

    /// Runs the animation-frame callbacks requested before this frame
    pub fn render_frame(&mut self, timestamp_ms: f64) {
        self.events.set_now(timestamp_ms);
        for task in self.events.take_frame_tasks() {
            self.run_task(task, timestamp_ms);
        }
    }

    /// Applies finished speculative loads
    pub fn pump_fetches(&mut self) {
        for completion in self.fetcher.poll_completed() {
            self.state.prefetch.complete(&completion);
        }
    }

    fn run_task(&mut self, task: Task, now_ms: f64) {
        match task {
            Task::RetryRequest { index } => self.request_month(index),
            Task::PostStartEvaluate { token } => {
                if let Some(pending) = self.state.pending.as_mut().filter(|p| p.token == token) {
                    pending.post_start = None;
                    self.evaluate_pending(token, "post-start");
                }
            }
            Task::Watchdog { token } => self.check_watchdog(token),
            Task::AwaitPaint { token, frames_left } => self.await_paint(token, frames_left, now_ms),
            Task::FadeStep { token } => self.fade_step(token, now_ms),
            Task::DetachPrevious { token, previous } => self.detach_previous(token, previous),
            Task::PlaybackTick => {
                self.state.playback_timer = None;
                self.playback_tick();
            }
            Task::RestartTransition { index } => {
                if self.state.pending.as_ref().map(|p| p.index) == Some(index) {
                    self.request_month(index as i64);
                }
            }
        }
    }

    /// Index the step controls move from
    pub fn active_control_index(&self) -> usize {
        self.state.requested_index.or(self.state.current_index).unwrap_or(0)
    }

    /// Index playback advances from
    pub fn displayed_index(&self) -> usize {
        self.state.current_index.unwrap_or(0)
    }

    pub fn dispatch(&mut self, command: ViewerCommand) {
        if command.is_navigation() {
            self.stop_playback();
        }
        match command {
            ViewerCommand::StepBack => self.request_month(self.active_control_index() as i64 - 1),
            ViewerCommand::StepForward => self.request_month(self.active_control_index() as i64 + 1),
            ViewerCommand::SelectMonth(index) => self.request_month(index as i64),
            ViewerCommand::TogglePlayback => self.toggle_playback(),
            ViewerCommand::SetFps(raw) => {
                let fps = self.config.parse_fps(&raw);
                self.set_fps(fps);
            }
        }
    }

    pub fn current_view_signature(&self) -> ViewSignature {
        if !self.surface.is_ready() {
            return ViewSignature::default();
        }
        self.sampler.view_signature(&self.surface.viewport())
    }

    /// Tile URLs of `month` covering the current view, nearest the center first
    pub fn month_visible_tile_urls(&self, month: Month, limit: Option<usize>) -> Vec<String> {
        if !self.surface.is_ready() {
            return Vec::new();
        }
        self.sampler
            .visible_tile_coords(&self.surface.viewport(), limit)
            .into_iter()
            .map(|coord| self.state.template.tile_url(month, coord))
            .collect()
    }

    /// True when the view needs at least one tile of `month` and every one is loaded
    pub fn is_month_ready_for_current_view(&self, month: Month) -> bool {
        let urls = self.month_visible_tile_urls(month, None);
        !urls.is_empty() && urls.iter().all(|url| self.state.prefetch.is_loaded(url))
    }

    pub fn start_prefetch_month(&mut self, month: Month, token: u64, max_tiles_per_month: usize) {
        if self.state.visible == Some(month) {
            return;
        }
        if self.state.pending.as_ref().map(|p| p.month) == Some(month) {
            return;
        }
        let view = self.state.view_signature.clone();
        if self.state.prefetch.covers(month, token, &view) {
            return;
        }
        let urls = self.month_visible_tile_urls(month, Some(max_tiles_per_month));
        if urls.is_empty() {
            return;
        }
        self.state.prefetch.begin_job(month, token, view, &urls, &mut self.fetcher);
    }

    /// Prefetches the `depth` months after `center_index` (wrapping) and
    /// drops jobs for every other month
    pub fn prefetch_forward_buffer(&mut self, center_index: usize, depth: usize) {
        if self.state.months.is_empty() || self.state.template.is_empty() {
            return;
        }
        self.state.view_signature = self.current_view_signature();
        let token = self.state.prefetch.ensure_token();
        let per_month = self.config.prefetch_tiles_per_month(depth);

        let mut keep: HashSet<Month> = HashSet::default();
        for step in 1..=depth {
            let month = self.state.months.wrapped(center_index as i64 + step as i64);
            if !keep.insert(month) {
                continue;
            }
            self.start_prefetch_month(month, token, per_month);
        }
        self.cancel_prefetch(Some(&keep));
    }

    pub fn cancel_prefetch(&mut self, keep_months: Option<&HashSet<Month>>) {
        self.state.prefetch.cancel(keep_months, &mut self.fetcher);
    }

    pub fn prefetch_neighbor_tiles(&mut self, center_index: usize) {
        let depth = if self.state.playing {
            self.config.playback_prefetch_months
        } else {
            1
        };
        self.prefetch_forward_buffer(center_index, depth);
        self.prune_layer_cache(center_index);
    }

    /// Neighbors of the center plus the visible and pending months
    pub fn layer_keep_set(&self, center_index: usize) -> HashSet<Month> {
        let months = &self.state.months;
        let mut keep: HashSet<Month> = HashSet::default();
        let neighbors = [center_index.checked_sub(1), Some(center_index), center_index.checked_add(1)];
        for month in neighbors.into_iter().flatten().filter_map(|index| months.get(index)) {
            keep.insert(month);
        }
        keep.extend(self.state.visible);
        keep.extend(self.state.pending.as_ref().map(|p| p.month));
        keep
    }

    pub fn prune_layer_cache(&mut self, center_index: usize) {
        let keep = self.layer_keep_set(center_index);
        self.state
            .layers
            .prune(&keep, self.config.max_layer_cache, &mut self.surface);
    }

    /// Called once a pan or zoom has settled
    pub fn on_view_settled(&mut self) {
        let signature = self.current_view_signature();
        if signature == self.state.view_signature {
            return;
        }
        log::debug!("view settled: {}", signature);
        self.state.view_signature = signature;
        self.state.buffering = None;
        self.cancel_prefetch(None);

        if self.state.playing {
            self.prefetch_forward_buffer(self.displayed_index(), self.config.playback_prefetch_months);
        } else if let Some(current) = self.state.current_index {
            self.prefetch_forward_buffer(current, 1);
        }

        if let Some(index) = self.state.pending.as_ref().map(|p| p.index) {
            self.events.set_timeout(0.0, Task::RestartTransition { index });
        }
    }
}
