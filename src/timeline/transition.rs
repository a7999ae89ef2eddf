//! Switching the visible month
//!
//! A transition freezes the tiles the view needs at the moment the month is
//! requested, counts them as they load or fail, and then either commits
//! (optionally crossfading over the previous month) or rejects and leaves
//! the committed month on screen. Only one transition exists at a time and
//! each carries a token; anything queued for an older token is inert.

use crate::core::constants::MAX_ERROR_URLS;
use crate::core::geo::TileKey;
use crate::core::month::Month;
use crate::layers::surface::{MapSurface, TileEvent, TileEventKind, TileRecord};
use crate::prelude::HashSet;
use crate::runtime::{FrameId, TimerId};
use crate::tiles::loader::TileFetcher;
use crate::tiles::sampler::ViewSignature;
use crate::tiles::source::tile_key_from_url;
use crate::timeline::controller::{Task, ViewerController};
use crate::ui::{StatusSeverity, ViewerUi};

/// Progress of the frozen required set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionCounts {
    pub required: usize,
    pub loaded: usize,
    pub errors: usize,
    pub resolved: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NoTilesRequested,
    TooManyErrors,
}

impl RejectReason {
    pub fn message(&self, month: Month) -> String {
        match self {
            Self::NoTilesRequested => {
                format!("No visible tiles were requested for {month}. Keeping current month visible.")
            }
            Self::TooManyErrors => format!("Missing tiles for {month}; keeping current month visible."),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Wait,
    Commit,
    Reject(RejectReason),
}

/// The in-flight switch to one month
#[derive(Debug, Clone)]
pub struct PendingTransition {
    pub token: u64,
    pub index: usize,
    pub month: Month,
    pub view: ViewSignature,
    pub required: Vec<TileKey>,
    required_set: HashSet<TileKey>,
    loaded: HashSet<TileKey>,
    errored: HashSet<TileKey>,
    pub error_urls: Vec<String>,
    pub error_threshold: usize,
    pub finalize_scheduled: bool,
    /// Tile events are only accepted until finalize
    pub(super) listening: bool,
    last_debug_key: String,
    pub(super) previous: Option<Month>,
    pub(super) fade_started_at: Option<f64>,
    pub(super) watchdog: Option<TimerId>,
    pub(super) post_start: Option<TimerId>,
    pub(super) frame: Option<FrameId>,
    pub(super) final_counts: TransitionCounts,
}

impl PendingTransition {
    /// `required` is deduplicated keeping first occurrences
    pub fn new(
        token: u64,
        index: usize,
        month: Month,
        view: ViewSignature,
        required: Vec<TileKey>,
        error_threshold: usize,
    ) -> Self {
        let mut required_set: HashSet<TileKey> = HashSet::default();
        let required: Vec<TileKey> = required.into_iter().filter(|key| required_set.insert(*key)).collect();
        Self {
            token,
            index,
            month,
            view,
            required,
            required_set,
            loaded: HashSet::default(),
            errored: HashSet::default(),
            error_urls: Vec::new(),
            error_threshold,
            finalize_scheduled: false,
            listening: true,
            last_debug_key: String::new(),
            previous: None,
            fade_started_at: None,
            watchdog: None,
            post_start: None,
            frame: None,
            final_counts: TransitionCounts::default(),
        }
    }

    pub fn is_required(&self, key: &TileKey) -> bool {
        self.required_set.contains(key)
    }

    /// Marks a required tile loaded, clearing any earlier error for it
    pub fn mark_loaded(&mut self, key: TileKey) -> bool {
        if !self.required_set.contains(&key) {
            return false;
        }
        self.loaded.insert(key);
        self.errored.remove(&key);
        true
    }

    /// Marks a required tile failed. Failing URLs are kept for diagnostics
    /// even when the tile is not part of the required set.
    pub fn mark_error(&mut self, key: Option<TileKey>, url: &str) -> bool {
        let required = key.map(|key| self.required_set.contains(&key)).unwrap_or(false);
        if !required {
            if !url.is_empty() && self.error_urls.len() < MAX_ERROR_URLS {
                self.error_urls.push(url.to_string());
            }
            return false;
        }
        if let Some(key) = key {
            if self.errored.insert(key) && self.error_urls.len() < MAX_ERROR_URLS {
                let url = if url.is_empty() { "(unknown)" } else { url };
                self.error_urls.push(url.to_string());
            }
        }
        true
    }

    /// Picks up tiles the surface already settled without an event reaching us,
    /// e.g. hits from its own cache or failures reported before we listened
    pub fn sync_from_records(&mut self, records: &[TileRecord]) {
        for record in records {
            if record.loaded {
                self.mark_loaded(record.coord);
            } else if record.errored && !self.loaded.contains(&record.coord) {
                self.mark_error(Some(record.coord), &record.url);
            }
        }
    }

    pub fn counts(&self) -> TransitionCounts {
        let mut counts = TransitionCounts {
            required: self.required.len(),
            ..TransitionCounts::default()
        };
        for key in &self.required {
            if self.loaded.contains(key) {
                counts.loaded += 1;
                counts.resolved += 1;
            } else if self.errored.contains(key) {
                counts.errors += 1;
                counts.resolved += 1;
            }
        }
        counts
    }

    /// Too many errors only rejects while there is something to fall back to
    pub fn decide(&self, counts: &TransitionCounts, has_visible: bool) -> Decision {
        if counts.required == 0 {
            Decision::Reject(RejectReason::NoTilesRequested)
        } else if counts.errors > self.error_threshold && has_visible {
            Decision::Reject(RejectReason::TooManyErrors)
        } else if counts.resolved < counts.required {
            Decision::Wait
        } else {
            Decision::Commit
        }
    }

    fn take_handles(&mut self) -> (Option<TimerId>, Option<TimerId>, Option<FrameId>) {
        (self.watchdog.take(), self.post_start.take(), self.frame.take())
    }
}

impl<S, F, U> ViewerController<S, F, U>
where
    S: MapSurface,
    F: TileFetcher,
    U: ViewerUi,
{
    fn clear_handles(&mut self, handles: (Option<TimerId>, Option<TimerId>, Option<FrameId>)) {
        let (watchdog, post_start, frame) = handles;
        for timer in [watchdog, post_start].into_iter().flatten() {
            self.events.clear_timeout(timer);
        }
        if let Some(frame) = frame {
            self.events.cancel_frame(frame);
        }
    }

    fn is_pending_token(&self, token: u64) -> bool {
        self.state.pending.as_ref().map(|p| p.token) == Some(token)
    }

    /// Starts switching to the month at `index` (clamped into range)
    pub fn request_month(&mut self, index: i64) {
        if self.state.months.is_empty() {
            return;
        }
        if !self.surface.is_ready() {
            self.events.request_frame(Task::RetryRequest { index });
            return;
        }

        let last = self.state.months.len() - 1;
        let target_index = index.clamp(0, last as i64) as usize;
        let Some(target_month) = self.state.months.get(target_index) else {
            return;
        };
        self.state.requested_index = Some(target_index);
        self.ui.show_month(target_index, target_month);

        if self.state.current_index == Some(target_index)
            && self.state.visible.is_some()
            && self.state.pending.is_none()
        {
            self.ui
                .set_status(&format!("Showing {target_month}."), StatusSeverity::Ok);
            return;
        }

        self.cancel_prefetch(None);
        self.cancel_pending_transition();
        self.state.transition_token += 1;
        let token = self.state.transition_token;
        let full = self.config.overlay_opacity;

        let url = self.state.template.month_url(target_month);
        let layer = self.state.layers.get_or_create(target_month, &url, &mut self.surface);
        if !self.surface.has_layer(target_month) {
            self.surface.add_layer(&layer);
        }
        self.surface.set_opacity(target_month, 0.0);
        if let Some(visible) = self.state.visible.filter(|visible| *visible != target_month) {
            self.surface.set_opacity(visible, full);
            self.surface.bring_to_front(visible);
        }
        self.surface.bring_to_front(target_month);

        let viewport = self.surface.viewport();
        let required = self.sampler.visible_tile_coords(&viewport, None);
        let view = self.sampler.view_signature(&viewport);
        let mut pending = PendingTransition::new(
            token,
            target_index,
            target_month,
            view,
            required,
            self.config.tile_error_threshold,
        );
        pending.watchdog = Some(self.events.set_timeout(self.config.watchdog_ms, Task::Watchdog { token }));
        log::debug!(
            "transition {} requested: {} ({} required tiles)",
            token,
            target_month,
            pending.required.len()
        );
        self.state.pending = Some(pending);

        self.evaluate_pending(token, "start");
        if self.is_pending_token(token) {
            let timer = self.events.set_timeout(0.0, Task::PostStartEvaluate { token });
            if let Some(pending) = self.state.pending.as_mut() {
                pending.post_start = Some(timer);
            }
        }
    }

    /// Feeds a tile event of the pending layer into the transition
    pub fn handle_tile_event(&mut self, event: TileEvent) {
        let Some(pending) = self.state.pending.as_mut() else {
            return;
        };
        if pending.month != event.month || !pending.listening {
            return;
        }
        let token = pending.token;
        let url = event.url.unwrap_or_default();
        let key = event.coords.or_else(|| tile_key_from_url(&url));

        match event.kind {
            TileEventKind::TileLoaded => {
                if let Some(key) = key {
                    pending.mark_loaded(key);
                }
                self.state.prefetch.mark_loaded(&url);
                self.evaluate_pending(token, "tileload");
            }
            TileEventKind::TileError => {
                pending.mark_error(key, &url);
                self.evaluate_pending(token, "tileerror");
            }
            TileEventKind::LayerLoaded => self.evaluate_pending(token, "load"),
        }
    }

    /// Re-checks the pending transition; a no-op once finalize is scheduled
    pub(super) fn evaluate_pending(&mut self, token: u64, reason: &str) {
        let has_visible = self.state.visible.is_some();
        let Some(pending) = self.state.pending.as_mut() else {
            return;
        };
        if pending.token != token || pending.finalize_scheduled {
            return;
        }

        let records = self.surface.tile_records(pending.month);
        pending.sync_from_records(&records);
        let counts = pending.counts();
        let debug_key = format!(
            "{}:{}:{}:{}:{}",
            reason, counts.required, counts.loaded, counts.errors, counts.resolved
        );
        if debug_key != pending.last_debug_key {
            log::debug!(
                "transition check {} {} ({}): required={} loaded={} errors={} resolved={} error_urls={:?}",
                pending.token,
                pending.month,
                reason,
                counts.required,
                counts.loaded,
                counts.errors,
                counts.resolved,
                pending.error_urls
            );
            pending.last_debug_key = debug_key;
        }

        match pending.decide(&counts, has_visible) {
            Decision::Wait => {}
            Decision::Reject(reason) => {
                let message = reason.message(pending.month);
                self.reject_pending(token, counts, &message);
            }
            Decision::Commit => {
                pending.finalize_scheduled = true;
                self.finalize_transition(token, counts);
            }
        }
    }

    pub(super) fn check_watchdog(&mut self, token: u64) {
        let has_visible = self.state.visible.is_some();
        let Some(pending) = self.state.pending.as_mut().filter(|p| p.token == token) else {
            return;
        };
        pending.watchdog = None;
        if pending.finalize_scheduled {
            return;
        }
        let records = self.surface.tile_records(pending.month);
        pending.sync_from_records(&records);
        let counts = pending.counts();
        log::debug!(
            "transition wait {} {}: required={} loaded={} errors={} resolved={}",
            pending.token,
            pending.month,
            counts.required,
            counts.loaded,
            counts.errors,
            counts.resolved
        );
        if counts.errors > pending.error_threshold && has_visible {
            let message = RejectReason::TooManyErrors.message(pending.month);
            self.reject_pending(token, counts, &message);
        }
    }

    /// Drops the transition and puts the committed month back on the controls
    fn reject_pending(&mut self, token: u64, counts: TransitionCounts, message: &str) {
        if !self.is_pending_token(token) {
            return;
        }
        let Some(mut pending) = self.state.pending.take() else {
            return;
        };
        let handles = pending.take_handles();
        self.clear_handles(handles);

        if self.state.visible == Some(pending.month) {
            self.surface.set_opacity(pending.month, self.config.overlay_opacity);
        } else {
            self.surface.set_opacity(pending.month, 0.0);
            if self.surface.has_layer(pending.month) {
                self.surface.remove_layer(pending.month);
            }
        }

        if let Some(current) = self.state.current_index {
            self.state.requested_index = Some(current);
            if let Some(month) = self.state.months.get(current) {
                self.ui.show_month(current, month);
            }
        }

        log::debug!(
            "transition rejected {} {}: required={} loaded={} errors={} error_urls={:?}",
            pending.token,
            pending.month,
            counts.required,
            counts.loaded,
            counts.errors,
            pending.error_urls
        );
        self.ui.set_status(message, StatusSeverity::Error);
    }

    fn finalize_transition(&mut self, token: u64, counts: TransitionCounts) {
        let previous = self.state.visible;
        let full = self.config.overlay_opacity;
        let frames = self.config.wait_after_load_frames.max(1);
        let Some(pending) = self.state.pending.as_mut().filter(|p| p.token == token) else {
            return;
        };
        let handles = (pending.watchdog.take(), pending.post_start.take(), None);
        pending.listening = false;
        pending.previous = previous;
        pending.final_counts = counts;
        let month = pending.month;
        self.clear_handles(handles);

        self.surface.bring_to_front(month);
        if let Some(previous) = previous.filter(|previous| *previous != month) {
            self.surface.set_opacity(previous, full);
        }

        let frame = self.events.request_frame(Task::AwaitPaint { token, frames_left: frames });
        if let Some(pending) = self.state.pending.as_mut() {
            pending.frame = Some(frame);
        }
    }

    pub(super) fn await_paint(&mut self, token: u64, frames_left: u32, now_ms: f64) {
        if !self.is_pending_token(token) {
            return;
        }
        if frames_left > 1 {
            let frame = self.events.request_frame(Task::AwaitPaint {
                token,
                frames_left: frames_left - 1,
            });
            if let Some(pending) = self.state.pending.as_mut() {
                pending.frame = Some(frame);
            }
            return;
        }
        self.start_fade(token, now_ms);
    }

    fn start_fade(&mut self, token: u64, now_ms: f64) {
        let full = self.config.overlay_opacity;
        let Some(pending) = self.state.pending.as_mut().filter(|p| p.token == token) else {
            return;
        };
        pending.frame = None;
        let month = pending.month;
        let previous = pending.previous;
        match previous {
            Some(previous) if previous != month && self.config.fade_duration_ms > 0.0 => {
                pending.fade_started_at = None;
                self.surface.set_opacity(previous, full);
                self.surface.set_opacity(month, 0.0);
                let frame = self.events.request_frame(Task::FadeStep { token });
                if let Some(pending) = self.state.pending.as_mut() {
                    pending.frame = Some(frame);
                }
                log::trace!("fade to {} started at {}", month, now_ms);
            }
            Some(previous) if previous != month => {
                self.surface.set_opacity(previous, full);
                self.surface.set_opacity(month, full);
                self.complete_commit(token);
            }
            _ => {
                self.surface.set_opacity(month, full);
                self.complete_commit(token);
            }
        }
    }

    pub(super) fn fade_step(&mut self, token: u64, timestamp_ms: f64) {
        if token != self.state.transition_token {
            return;
        }
        let full = self.config.overlay_opacity;
        let duration = self.config.fade_duration_ms;
        let Some(pending) = self.state.pending.as_mut().filter(|p| p.token == token) else {
            return;
        };
        let start = *pending.fade_started_at.get_or_insert(timestamp_ms);
        let progress = ((timestamp_ms - start) / duration).clamp(0.0, 1.0);
        let month = pending.month;
        self.surface.set_opacity(month, full * progress as f32);

        if progress < 1.0 {
            let frame = self.events.request_frame(Task::FadeStep { token });
            if let Some(pending) = self.state.pending.as_mut() {
                pending.frame = Some(frame);
            }
        } else {
            self.complete_commit(token);
        }
    }

    /// Makes the pending month the visible one
    fn complete_commit(&mut self, token: u64) {
        if token != self.state.transition_token || !self.is_pending_token(token) {
            return;
        }
        let Some(pending) = self.state.pending.take() else {
            return;
        };
        let counts = pending.final_counts;
        self.surface.set_opacity(pending.month, self.config.overlay_opacity);
        self.state.visible = Some(pending.month);
        self.state.current_index = Some(pending.index);
        self.state.requested_index = Some(pending.index);
        self.ui.show_month(pending.index, pending.month);
        self.prefetch_neighbor_tiles(pending.index);

        if let Some(previous) = pending.previous.filter(|previous| *previous != pending.month) {
            self.events.request_frame(Task::DetachPrevious { token, previous });
        }

        log::debug!(
            "transition committed {} {}: required={} loaded={} errors={} error_urls={:?}",
            pending.token,
            pending.month,
            counts.required,
            counts.loaded,
            counts.errors,
            pending.error_urls
        );
        if counts.errors > 0 {
            self.ui.set_status(
                &format!("Showing {} ({} tile errors).", pending.month, counts.errors),
                StatusSeverity::Error,
            );
        } else {
            self.ui
                .set_status(&format!("Showing {}.", pending.month), StatusSeverity::Ok);
        }
    }

    pub(super) fn detach_previous(&mut self, token: u64, previous: Month) {
        if token != self.state.transition_token {
            return;
        }
        self.surface.set_opacity(previous, self.config.overlay_opacity);
        if self.surface.has_layer(previous) {
            self.surface.remove_layer(previous);
        }
    }

    /// Tears down the pending transition without committing or rejecting it
    pub fn cancel_pending_transition(&mut self) {
        let Some(mut pending) = self.state.pending.take() else {
            return;
        };
        let handles = pending.take_handles();
        self.clear_handles(handles);
        self.surface.set_opacity(pending.month, self.config.overlay_opacity);
        if self.state.visible != Some(pending.month) && self.surface.has_layer(pending.month) {
            self.surface.remove_layer(pending.month);
        }
        log::debug!("transition canceled {} {}", pending.token, pending.month);
    }
}
