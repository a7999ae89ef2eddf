//! Engine-wide constants for the month viewer.
//! Keeping them in a single place makes it easier to tweak the magic numbers;
//! `ViewerConfig::default()` is built from these.

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Opacity of a fully shown month overlay.
pub const OVERLAY_OPACITY: f32 = 0.82;

/// Crossfade duration when a month is committed.
pub const FADE_DURATION_MS: f64 = 180.0;

/// Animation frames to wait after the last tile resolved before fading in.
pub const WAIT_AFTER_LOAD_FRAMES: u32 = 1;

/// Tile errors tolerated by a transition before it may be rejected.
pub const TILE_ERROR_THRESHOLD: usize = 2;

/// A pending transition is re-checked after this long.
pub const TRANSITION_WATCHDOG_MS: f64 = 5000.0;

/// Nominal number of month layers kept alive.
pub const MAX_LAYER_CACHE: usize = 3;

/// Total prefetch images in flight across all look-ahead months.
pub const PREFETCH_MAX_TOTAL_IMAGES: usize = 192;

/// Floor for the per-month prefetch cap.
pub const PREFETCH_MIN_TILES_PER_MONTH: usize = 6;

/// Loaded-URL memory; oldest entries are forgotten first.
pub const PREFETCH_CACHE_MAX_URLS: usize = 2000;

/// Months buffered ahead of the displayed one during playback.
pub const PLAYBACK_PREFETCH_MONTHS: usize = 3;

/// How long playback waits on one month before backing off.
pub const PLAYBACK_READY_MAX_WAIT_MS: f64 = 1200.0;

/// Retry cadence while the next month is buffering.
pub const PLAYBACK_BUFFER_RETRY_MS: f64 = 300.0;

/// No timer is ever armed for less than this.
pub const MIN_TIMER_DELAY_MS: f64 = 16.0;

pub const DEFAULT_FPS: f64 = 2.0;
pub const MIN_FPS: f64 = 0.25;
pub const MAX_FPS: f64 = 5.0;

/// Coverage window of the data set (inclusive).
pub const COVERAGE_START_MONTH: &str = "2000-01";
pub const COVERAGE_END_MONTH: &str = "2020-12";

/// Native zoom range assumed when a manifest does not declare one.
pub const DEFAULT_MIN_NATIVE_ZOOM: u8 = 0;
pub const DEFAULT_MAX_NATIVE_ZOOM: u8 = 5;

/// Failing tile URLs remembered per transition for diagnostics.
pub const MAX_ERROR_URLS: usize = 3;

/// Status lines a [`PanelState`](crate::ui::PanelState) keeps, oldest dropped first.
pub const STATUS_HISTORY_LIMIT: usize = 32;
