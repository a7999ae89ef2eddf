//! Prelude module for common chronotile types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use chronotile::prelude::*;`

pub use crate::core::{
    config::ViewerConfig,
    geo::{LatLng, Point, TileCoord, TileKey},
    manifest::{Manifest, TimeSeriesSource},
    month::{Coverage, Month, MonthSequence},
    viewport::Viewport,
};

pub use crate::layers::{
    cache::{LayerCache, MonthLayer},
    headless::{HeadlessMap, TileRequest},
    surface::{MapSurface, TileEvent, TileEventKind, TileRecord},
};

pub use crate::tiles::{
    loader::{DeferredFetcher, FetchCompletion, FetchId, FetchOutcome, TileFetcher},
    prefetch::PrefetchCache,
    sampler::{ViewSampler, ViewSignature},
    source::UrlTemplate,
};

#[cfg(feature = "tokio-runtime")]
pub use crate::tiles::loader::HttpTileFetcher;

pub use crate::runtime::{EventLoop, MonotonicClock};

pub use crate::timeline::{Buffering, Task, ViewerController, ViewerState};

pub use crate::ui::{PanelState, StatusSeverity, ViewerCommand, ViewerUi};

pub use crate::{Error as ViewerError, Result};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
