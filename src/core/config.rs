//! Configuration for the month viewer
//!
//! Every tunable of the transition, prefetch and playback machinery lives in
//! [`ViewerConfig`]. Presets cover the common cases; custom values can be
//! loaded from JSON where any omitted field falls back to its default.

use crate::core::constants::*;
use crate::{Result, ViewerError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Opacity of a fully shown month layer
    pub overlay_opacity: f32,
    /// Crossfade duration in milliseconds; 0 switches instantly
    pub fade_duration_ms: f64,
    /// Frames to wait after tiles resolve before the fade starts
    pub wait_after_load_frames: u32,
    /// Tile errors tolerated before a transition may be rejected
    pub tile_error_threshold: usize,
    /// Delay before a stuck transition is re-checked
    pub watchdog_ms: f64,
    /// Nominal layer cache size
    pub max_layer_cache: usize,
    /// Total prefetch images across the look-ahead window
    pub prefetch_max_total_images: usize,
    /// Floor for the per-month prefetch cap
    pub prefetch_min_tiles_per_month: usize,
    /// Capacity of the loaded-URL memory
    pub prefetch_cache_max_urls: usize,
    /// Look-ahead depth while playing
    pub playback_prefetch_months: usize,
    /// Wait on one buffering month before backing off
    pub playback_ready_max_wait_ms: f64,
    /// Retry cadence while buffering
    pub playback_buffer_retry_ms: f64,
    /// Smallest delay a timer is armed with
    pub min_timer_delay_ms: f64,
    pub default_fps: f64,
    pub min_fps: f64,
    pub max_fps: f64,
    pub tile_size: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            overlay_opacity: OVERLAY_OPACITY,
            fade_duration_ms: FADE_DURATION_MS,
            wait_after_load_frames: WAIT_AFTER_LOAD_FRAMES,
            tile_error_threshold: TILE_ERROR_THRESHOLD,
            watchdog_ms: TRANSITION_WATCHDOG_MS,
            max_layer_cache: MAX_LAYER_CACHE,
            prefetch_max_total_images: PREFETCH_MAX_TOTAL_IMAGES,
            prefetch_min_tiles_per_month: PREFETCH_MIN_TILES_PER_MONTH,
            prefetch_cache_max_urls: PREFETCH_CACHE_MAX_URLS,
            playback_prefetch_months: PLAYBACK_PREFETCH_MONTHS,
            playback_ready_max_wait_ms: PLAYBACK_READY_MAX_WAIT_MS,
            playback_buffer_retry_ms: PLAYBACK_BUFFER_RETRY_MS,
            min_timer_delay_ms: MIN_TIMER_DELAY_MS,
            default_fps: DEFAULT_FPS,
            min_fps: MIN_FPS,
            max_fps: MAX_FPS,
            tile_size: TILE_SIZE,
        }
    }
}

/// Unified configuration presets
impl ViewerConfig {
    /// Instant switches so tests can commit with a single frame
    pub fn for_testing() -> Self {
        Self {
            fade_duration_ms: 0.0,
            ..Self::default()
        }
    }

    /// Parses a JSON document; omitted fields keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the viewer cannot run with
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(ViewerError::Config(reason));
        if !(self.min_fps.is_finite() && self.min_fps > 0.0) {
            return invalid(format!("min_fps must be positive, got {}", self.min_fps));
        }
        if !self.max_fps.is_finite() || self.min_fps > self.max_fps {
            return invalid(format!("fps range {} to {} is empty", self.min_fps, self.max_fps));
        }
        if !(self.min_fps..=self.max_fps).contains(&self.default_fps) {
            return invalid(format!(
                "default_fps {} is outside {} to {}",
                self.default_fps, self.min_fps, self.max_fps
            ));
        }
        if self.tile_size == 0 {
            return invalid("tile_size must be at least one pixel".to_string());
        }
        if !(0.0..=1.0).contains(&self.overlay_opacity) {
            return invalid(format!("overlay_opacity {} is outside 0 to 1", self.overlay_opacity));
        }
        let durations = [
            ("fade_duration_ms", self.fade_duration_ms),
            ("watchdog_ms", self.watchdog_ms),
            ("playback_ready_max_wait_ms", self.playback_ready_max_wait_ms),
            ("playback_buffer_retry_ms", self.playback_buffer_retry_ms),
            ("min_timer_delay_ms", self.min_timer_delay_ms),
        ];
        for (name, value) in durations {
            if !(value.is_finite() && value >= 0.0) {
                return invalid(format!("{name} must be a non-negative number, got {value}"));
            }
        }
        Ok(())
    }

    /// Clamps a frame rate into the configured range
    pub fn clamp_fps(&self, fps: f64) -> f64 {
        if !fps.is_finite() {
            return self.default_fps;
        }
        // an inverted range resolves to max_fps
        fps.max(self.min_fps).min(self.max_fps)
    }

    /// Parses user input for the playback speed, falling back to the default rate.
    /// Trailing text after the number is ignored, so `"3x"` reads as 3.
    pub fn parse_fps(&self, value: &str) -> f64 {
        self.clamp_fps(leading_number(value).unwrap_or(f64::NAN))
    }

    /// Per-month prefetch cap so total speculative images stay bounded regardless of depth
    pub fn prefetch_tiles_per_month(&self, depth: usize) -> usize {
        (self.prefetch_max_total_images / depth.max(1)).max(self.prefetch_min_tiles_per_month)
    }
}

/// Longest prefix of `value` (after leading whitespace) that reads as a number
fn leading_number(value: &str) -> Option<f64> {
    let value = value.trim_start();
    let end = value
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | 'e' | 'E')))
        .unwrap_or(value.len());
    (1..=end).rev().find_map(|len| value[..len].parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = ViewerConfig::default();
        assert_eq!(config.tile_error_threshold, 2);
        assert_eq!(config.max_layer_cache, 3);
        assert_eq!(config.fade_duration_ms, 180.0);
        assert_eq!(config.overlay_opacity, 0.82);
    }

    #[test]
    fn test_parse_fps_clamps_and_defaults() {
        let config = ViewerConfig::default();
        assert_eq!(config.parse_fps("3"), 3.0);
        assert_eq!(config.parse_fps("12"), 5.0);
        assert_eq!(config.parse_fps("0.1"), 0.25);
        assert_eq!(config.parse_fps("fast"), 2.0);
        assert_eq!(config.parse_fps(""), 2.0);
    }

    #[test]
    fn test_parse_fps_reads_leading_number() {
        let config = ViewerConfig::default();
        assert_eq!(config.parse_fps("3x"), 3.0);
        assert_eq!(config.parse_fps(" 1.5 fps"), 1.5);
        assert_eq!(config.parse_fps("4e"), 4.0);
        assert_eq!(config.parse_fps("2.5.1"), 2.5);
        assert_eq!(config.parse_fps("x3"), 2.0);
        assert_eq!(config.parse_fps("-"), 2.0);
    }

    #[test]
    fn test_clamp_fps_with_inverted_range() {
        let config = ViewerConfig { min_fps: 6.0, max_fps: 1.0, ..ViewerConfig::default() };
        assert_eq!(config.clamp_fps(3.0), 1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unusable_values() {
        assert!(ViewerConfig::default().validate().is_ok());
        assert!(ViewerConfig::for_testing().validate().is_ok());

        for json in [
            r#"{"min_fps": 6, "max_fps": 1}"#,
            r#"{"min_fps": 0}"#,
            r#"{"default_fps": 9}"#,
            r#"{"tile_size": 0}"#,
            r#"{"overlay_opacity": 1.5}"#,
            r#"{"fade_duration_ms": -1}"#,
        ] {
            assert!(
                matches!(ViewerConfig::from_json_str(json), Err(ViewerError::Config(_))),
                "{json} should be rejected"
            );
        }
    }

    #[test]
    fn test_prefetch_tiles_per_month() {
        let config = ViewerConfig::default();
        assert_eq!(config.prefetch_tiles_per_month(1), 192);
        assert_eq!(config.prefetch_tiles_per_month(3), 64);
        assert_eq!(config.prefetch_tiles_per_month(0), 192);
        assert_eq!(config.prefetch_tiles_per_month(100), 6);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ViewerConfig::from_json_str(r#"{"fade_duration_ms": 0, "max_layer_cache": 5}"#).unwrap();
        assert_eq!(config.fade_duration_ms, 0.0);
        assert_eq!(config.max_layer_cache, 5);
        assert_eq!(config.tile_error_threshold, 2);
        assert!(ViewerConfig::from_json_str("{not json").is_err());
    }
}
