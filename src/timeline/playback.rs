//! Timed advance through the months
//!
//! Playback re-arms a single timer. A tick only requests the next month
//! once every tile the current view needs for it is already loaded, so a
//! slow network stretches the frame interval instead of showing holes.

use crate::layers::surface::MapSurface;
use crate::tiles::loader::TileFetcher;
use crate::timeline::controller::{Buffering, Task, ViewerController};
use crate::ui::ViewerUi;

impl<S, F, U> ViewerController<S, F, U>
where
    S: MapSurface,
    F: TileFetcher,
    U: ViewerUi,
{
    /// Nominal delay between months at the current rate
    pub fn frame_interval_ms(&self) -> f64 {
        (1000.0 / self.state.fps).round()
    }

    /// Re-arms the playback timer. `None` means one frame interval; the
    /// delay never drops below the minimum timer delay.
    pub fn schedule_playback_tick(&mut self, delay_ms: Option<f64>) {
        if !self.state.playing {
            return;
        }
        if let Some(timer) = self.state.playback_timer.take() {
            self.events.clear_timeout(timer);
        }
        let delay = delay_ms
            .filter(|delay| delay.is_finite())
            .map(f64::round)
            .unwrap_or_else(|| self.frame_interval_ms())
            .max(self.config.min_timer_delay_ms);
        self.state.playback_timer = Some(self.events.set_timeout(delay, Task::PlaybackTick));
    }

    pub fn start_playback(&mut self) {
        if self.state.months.is_empty() {
            return;
        }
        self.stop_playback();
        self.state.playing = true;
        self.ui.set_playing(true);
        log::info!("playback started at {} fps", self.state.fps);
        self.prefetch_forward_buffer(self.displayed_index(), self.config.playback_prefetch_months);
        self.schedule_playback_tick(Some(0.0));
    }

    pub fn stop_playback(&mut self) {
        if let Some(timer) = self.state.playback_timer.take() {
            self.events.clear_timeout(timer);
        }
        if self.state.playing {
            log::info!("playback stopped");
        }
        self.state.playing = false;
        self.state.buffering = None;
        self.ui.set_playing(false);
    }

    pub fn toggle_playback(&mut self) {
        if self.state.playing {
            self.stop_playback();
        } else {
            self.start_playback();
        }
    }

    /// Changes the rate; a running playback picks it up from now
    pub fn set_fps(&mut self, fps: f64) {
        self.state.fps = self.config.clamp_fps(fps);
        if self.state.playing {
            let interval = self.frame_interval_ms();
            self.schedule_playback_tick(Some(interval));
        }
    }

    pub(super) fn playback_tick(&mut self) {
        if !self.state.playing || self.state.months.is_empty() {
            return;
        }
        let interval = self.frame_interval_ms();
        if self.state.pending.is_some() {
            self.schedule_playback_tick(Some(interval));
            return;
        }

        let current = self.displayed_index();
        let next_index = (current + 1) % self.state.months.len();
        let Some(next_month) = self.state.months.get(next_index) else {
            return;
        };
        self.prefetch_forward_buffer(current, self.config.playback_prefetch_months);

        if self.is_month_ready_for_current_view(next_month) {
            self.state.buffering = None;
            self.request_month(next_index as i64);
            self.schedule_playback_tick(Some(interval));
            return;
        }

        let now = self.events.now();
        let buffering = match self.state.buffering {
            Some(buffering) if buffering.month == next_month => buffering,
            _ => {
                log::debug!("playback buffering {}", next_month);
                Buffering { month: next_month, start_ms: now }
            }
        };
        let retry = self.config.playback_buffer_retry_ms;
        if now - buffering.start_ms >= self.config.playback_ready_max_wait_ms {
            self.state.buffering = Some(Buffering { month: next_month, start_ms: now });
            self.schedule_playback_tick(Some(retry.max(interval)));
        } else {
            self.state.buffering = Some(buffering);
            self.schedule_playback_tick(Some(retry.min(interval)));
        }
    }
}
