//! In-memory map surface
//!
//! `HeadlessMap` behaves like a tiled map without drawing anything: attached
//! layers get tile records for the current view, and each new tile is queued
//! as a [`TileRequest`] for the host to fulfil through
//! [`HeadlessMap::resolve_tile`].

use crate::core::geo::TileCoord;
use crate::core::month::Month;
use crate::core::viewport::Viewport;
use crate::layers::cache::MonthLayer;
use crate::layers::surface::{MapSurface, TileEvent, TileRecord};
use crate::tiles::sampler::ViewSampler;
use crate::tiles::source::{fill_template, TileUrlParams};
use std::collections::{BTreeMap, VecDeque};

/// A tile the surface wants loaded
#[derive(Debug, Clone, PartialEq)]
pub struct TileRequest {
    pub month: Month,
    pub coord: TileCoord,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TileState {
    Loading,
    Loaded,
    Errored,
}

#[derive(Debug, Clone)]
struct Tile {
    state: TileState,
    url: String,
}

#[derive(Debug, Clone)]
struct AttachedLayer {
    month: Month,
    url: String,
    opacity: f32,
    tiles: BTreeMap<TileCoord, Tile>,
    settled: bool,
}

pub struct HeadlessMap {
    viewport: Viewport,
    sampler: ViewSampler,
    ready: bool,
    /// Back to front
    layers: Vec<AttachedLayer>,
    requests: VecDeque<TileRequest>,
}

impl HeadlessMap {
    pub fn new(viewport: Viewport, sampler: ViewSampler) -> Self {
        Self {
            viewport,
            sampler,
            ready: true,
            layers: Vec::new(),
            requests: VecDeque::new(),
        }
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Moves the view. Attached layers drop tiles that left the view and
    /// request the ones that entered it.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        let coords = self.sampler.visible_tile_coords(&self.viewport, None);
        for index in 0..self.layers.len() {
            self.layers[index].tiles.retain(|coord, _| coords.contains(coord));
            self.request_tiles(index, &coords);
        }
    }

    fn request_tiles(&mut self, index: usize, coords: &[TileCoord]) {
        let layer = &mut self.layers[index];
        for coord in coords {
            if layer.tiles.contains_key(coord) {
                continue;
            }
            let url = fill_template(&layer.url, &TileUrlParams::new(layer.month, *coord));
            layer.tiles.insert(
                *coord,
                Tile {
                    state: TileState::Loading,
                    url: url.clone(),
                },
            );
            layer.settled = false;
            self.requests.push_back(TileRequest {
                month: layer.month,
                coord: *coord,
                url,
            });
        }
    }

    fn position(&self, month: Month) -> Option<usize> {
        self.layers.iter().position(|layer| layer.month == month)
    }

    /// Tile loads queued since the last call
    pub fn take_tile_requests(&mut self) -> Vec<TileRequest> {
        self.requests.drain(..).collect()
    }

    /// Settles one tile and returns the events a real map would emit.
    /// Tiles that are unknown or already settled produce nothing.
    pub fn resolve_tile(&mut self, month: Month, coord: TileCoord, loaded: bool) -> Vec<TileEvent> {
        let Some(index) = self.position(month) else {
            return Vec::new();
        };
        let layer = &mut self.layers[index];
        let Some(tile) = layer.tiles.get_mut(&coord) else {
            return Vec::new();
        };
        if tile.state != TileState::Loading {
            return Vec::new();
        }

        let mut events = Vec::new();
        if loaded {
            tile.state = TileState::Loaded;
            events.push(TileEvent::tile_loaded(month, coord, tile.url.clone()));
        } else {
            tile.state = TileState::Errored;
            events.push(TileEvent::tile_error(month, coord, tile.url.clone()));
        }

        let all_settled = layer.tiles.values().all(|tile| tile.state != TileState::Loading);
        if all_settled && !layer.settled {
            layer.settled = true;
            events.push(TileEvent::layer_loaded(month));
        }
        events
    }

    /// Loads every outstanding tile of every attached layer
    pub fn load_all(&mut self) -> Vec<TileEvent> {
        self.requests.clear();
        let pending: Vec<(Month, TileCoord)> = self
            .layers
            .iter()
            .flat_map(|layer| {
                layer
                    .tiles
                    .iter()
                    .filter(|(_, tile)| tile.state == TileState::Loading)
                    .map(move |(coord, _)| (layer.month, *coord))
            })
            .collect();
        pending
            .into_iter()
            .flat_map(|(month, coord)| self.resolve_tile(month, coord, true))
            .collect()
    }

    pub fn opacity(&self, month: Month) -> Option<f32> {
        self.position(month).map(|index| self.layers[index].opacity)
    }

    /// Attached months, back to front
    pub fn layer_order(&self) -> Vec<Month> {
        self.layers.iter().map(|layer| layer.month).collect()
    }

    pub fn front(&self) -> Option<Month> {
        self.layers.last().map(|layer| layer.month)
    }

    pub fn layer_url(&self, month: Month) -> Option<&str> {
        self.position(month).map(|index| self.layers[index].url.as_str())
    }
}

impl MapSurface for HeadlessMap {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn viewport(&self) -> Viewport {
        self.viewport.clone()
    }

    fn has_layer(&self, month: Month) -> bool {
        self.position(month).is_some()
    }

    fn add_layer(&mut self, layer: &MonthLayer) {
        if self.has_layer(layer.month) {
            return;
        }
        self.layers.push(AttachedLayer {
            month: layer.month,
            url: layer.url.clone(),
            opacity: 1.0,
            tiles: BTreeMap::new(),
            settled: false,
        });
        let coords = self.sampler.visible_tile_coords(&self.viewport, None);
        self.request_tiles(self.layers.len() - 1, &coords);
    }

    fn remove_layer(&mut self, month: Month) {
        self.layers.retain(|layer| layer.month != month);
        self.requests.retain(|request| request.month != month);
    }

    fn set_layer_url(&mut self, month: Month, url: &str) {
        let Some(index) = self.position(month) else {
            return;
        };
        self.layers[index].url = url.to_string();
        self.layers[index].tiles.clear();
        self.requests.retain(|request| request.month != month);
        let coords = self.sampler.visible_tile_coords(&self.viewport, None);
        self.request_tiles(index, &coords);
    }

    fn set_opacity(&mut self, month: Month, opacity: f32) {
        if let Some(index) = self.position(month) {
            self.layers[index].opacity = opacity.clamp(0.0, 1.0);
        }
    }

    fn bring_to_front(&mut self, month: Month) {
        if let Some(index) = self.position(month) {
            let layer = self.layers.remove(index);
            self.layers.push(layer);
        }
    }

    fn tile_records(&self, month: Month) -> Vec<TileRecord> {
        let Some(index) = self.position(month) else {
            return Vec::new();
        };
        self.layers[index]
            .tiles
            .iter()
            .map(|(coord, tile)| TileRecord {
                coord: *coord,
                loaded: tile.state == TileState::Loaded,
                errored: tile.state == TileState::Errored,
                url: tile.url.clone(),
            })
            .collect()
    }
}
