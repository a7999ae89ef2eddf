use crate::core::geo::TileCoord;
use crate::core::month::Month;
use crate::core::viewport::Viewport;
use crate::layers::cache::MonthLayer;
use serde::{Deserialize, Serialize};

/// Tile the surface has created for a layer, as last reported by it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    pub coord: TileCoord,
    pub loaded: bool,
    /// The surface gave up on this tile
    #[serde(default)]
    pub errored: bool,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileEventKind {
    TileLoaded,
    TileError,
    /// Every tile of the layer's current view has settled
    LayerLoaded,
}

/// Load notification for one month layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileEvent {
    pub month: Month,
    pub kind: TileEventKind,
    pub coords: Option<TileCoord>,
    pub url: Option<String>,
}

impl TileEvent {
    pub fn tile_loaded(month: Month, coord: TileCoord, url: impl Into<String>) -> Self {
        Self {
            month,
            kind: TileEventKind::TileLoaded,
            coords: Some(coord),
            url: Some(url.into()),
        }
    }

    pub fn tile_error(month: Month, coord: TileCoord, url: impl Into<String>) -> Self {
        Self {
            month,
            kind: TileEventKind::TileError,
            coords: Some(coord),
            url: Some(url.into()),
        }
    }

    pub fn layer_loaded(month: Month) -> Self {
        Self {
            month,
            kind: TileEventKind::LayerLoaded,
            coords: None,
            url: None,
        }
    }
}

/// The map the month layers are drawn on.
///
/// Layers are identified by month. The surface owns tile fetching for
/// attached layers and reports progress back as [`TileEvent`]s, which the
/// host forwards to the controller.
pub trait MapSurface {
    /// Whether the map has a size and a view yet
    fn is_ready(&self) -> bool;

    fn viewport(&self) -> Viewport;

    fn has_layer(&self, month: Month) -> bool;

    /// Attaches a layer at full opacity on top of the others
    fn add_layer(&mut self, layer: &MonthLayer);

    fn remove_layer(&mut self, month: Month);

    /// Repoints an attached layer at a new month-bound URL
    fn set_layer_url(&mut self, month: Month, url: &str);

    fn set_opacity(&mut self, month: Month, opacity: f32);

    fn bring_to_front(&mut self, month: Month);

    /// Tiles currently created for the layer; empty when it is detached
    fn tile_records(&self, month: Month) -> Vec<TileRecord>;
}
