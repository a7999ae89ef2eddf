//! Which tiles cover the current view, and a signature identifying that view.

use crate::core::geo::TileCoord;
use crate::core::viewport::Viewport;
use serde::{Deserialize, Serialize};
use std::fmt;

/// String uniquely determined by the clamped zoom and pixel bounds of a view
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewSignature(String);

impl ViewSignature {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ViewSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Samples a viewport at the data set's native zoom range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewSampler {
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub tile_size: u32,
}

impl ViewSampler {
    pub fn new(min_zoom: u8, max_zoom: u8, tile_size: u32) -> Self {
        Self {
            min_zoom: min_zoom.min(max_zoom),
            max_zoom: max_zoom.max(min_zoom),
            tile_size: tile_size.max(1),
        }
    }

    /// Integer zoom the data is requested at for this view
    pub fn clamped_zoom(&self, viewport: &Viewport) -> u8 {
        let zoom = if viewport.zoom.is_finite() { viewport.zoom.round() } else { 0.0 };
        zoom.clamp(self.min_zoom as f64, self.max_zoom as f64) as u8
    }

    /// Tiles covering the viewport, nearest to the view center first.
    ///
    /// Ties keep row-major order so the result is deterministic for a fixed
    /// viewport. `limit` truncates after sorting and is never below one.
    pub fn visible_tile_coords(&self, viewport: &Viewport, limit: Option<usize>) -> Vec<TileCoord> {
        let zoom = self.clamped_zoom(viewport);
        let bounds = viewport.pixel_bounds(zoom as f64, self.tile_size);
        let (min_x, min_y, max_x, max_y) = bounds.tile_range(self.tile_size);

        let center = viewport.project_at(&viewport.center, zoom as f64, self.tile_size);
        let size = self.tile_size as f64;
        let center_x = (center.x / size).floor() as i64;
        let center_y = (center.y / size).floor() as i64;

        let mut coords: Vec<(i64, TileCoord)> = Vec::new();
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                if let Some(coord) = TileCoord::checked(x, y, zoom) {
                    let distance = (x - center_x).abs() + (y - center_y).abs();
                    coords.push((distance, coord));
                }
            }
        }

        coords.sort_by_key(|(distance, _)| *distance);
        let mut coords: Vec<TileCoord> = coords.into_iter().map(|(_, coord)| coord).collect();
        if let Some(limit) = limit {
            coords.truncate(limit.max(1));
        }
        coords
    }

    pub fn view_signature(&self, viewport: &Viewport) -> ViewSignature {
        let zoom = self.clamped_zoom(viewport);
        let bounds = viewport.pixel_bounds(zoom as f64, self.tile_size);
        ViewSignature(format!(
            "{}:{}:{}:{}:{}",
            zoom,
            bounds.min.x as i64,
            bounds.min.y as i64,
            bounds.max.x as i64,
            bounds.max.y as i64
        ))
    }
}
