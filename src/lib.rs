//! # chronotile
//!
//! Animated month-by-month raster tile overlays.
//!
//! A data set is a sequence of months, each served as its own XYZ tile
//! pyramid. The [`ViewerController`] switches the visible month only once
//! every tile the current view needs for it has resolved, crossfading over
//! the previous month, while prefetching the months playback will need next
//! and keeping a small cache of month layers around.
//!
//! The map itself, the network and the controls are collaborators behind
//! the [`MapSurface`], [`TileFetcher`] and [`ViewerUi`] traits. All deferred
//! work runs on a cooperative [`EventLoop`] the host drives.

pub mod core;
pub mod layers;
pub mod prelude;
pub mod runtime;
pub mod tiles;
pub mod timeline;
pub mod ui;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    config::ViewerConfig,
    geo::{LatLng, Point, TileCoord, TileKey},
    manifest::{Manifest, TimeSeriesSource},
    month::{Coverage, Month, MonthSequence},
    viewport::Viewport,
};

pub use layers::{
    cache::{LayerCache, MonthLayer},
    headless::{HeadlessMap, TileRequest},
    surface::{MapSurface, TileEvent, TileEventKind, TileRecord},
};

pub use tiles::{
    loader::{DeferredFetcher, FetchCompletion, FetchId, FetchOutcome, TileFetcher},
    prefetch::PrefetchCache,
    sampler::{ViewSampler, ViewSignature},
    source::{fill_template, tile_key_from_url, UrlTemplate},
};

#[cfg(feature = "tokio-runtime")]
pub use tiles::loader::HttpTileFetcher;

pub use runtime::{EventLoop, MonotonicClock};

pub use timeline::{PendingTransition, ViewerController, ViewerState};

pub use ui::{PanelState, StatusSeverity, ViewerCommand, ViewerUi};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, ViewerError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid month: {0}")]
    InvalidMonth(String),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Fetch error: {0}")]
    Fetch(String),
}

/// Error type alias for convenience
pub type Error = ViewerError;

/// Installs `env_logger`, honouring `RUST_LOG`; later calls are no-ops
#[cfg(feature = "debug")]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
