use crate::core::constants::TILE_SIZE;
use crate::core::geo::{LatLng, PixelBounds, Point};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Manages the current view of the map: center, zoom, and screen dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// The center of the map view in geographical coordinates
    pub center: LatLng,
    /// The current (possibly fractional) zoom level
    pub zoom: f64,
    /// The size of the viewport in pixels
    pub size: Point,
}

impl Viewport {
    /// Creates a new viewport
    pub fn new(center: LatLng, zoom: f64, size: Point) -> Self {
        Self {
            center,
            zoom: zoom.clamp(0.0, 18.0),
            size,
        }
    }

    /// Sets the center of the viewport
    pub fn set_center(&mut self, center: LatLng) {
        self.center = LatLng::new(LatLng::clamp_lat(center.lat), center.lng);
    }

    /// Moves the center by a screen-pixel offset at the current zoom
    pub fn pan_by(&mut self, offset: Point) {
        let center_px = self.project(&self.center, self.zoom);
        let target = center_px.add(&offset);
        let center = self.unproject(&target, self.zoom);
        self.set_center(center);
    }

    /// Projects a LatLng to world pixel coordinates at the given zoom level (EPSG:3857)
    pub fn project(&self, lat_lng: &LatLng, zoom: f64) -> Point {
        self.project_at(lat_lng, zoom, TILE_SIZE)
    }

    /// Same as [`Viewport::project`] for a pyramid whose tiles are `tile_size` pixels wide
    pub fn project_at(&self, lat_lng: &LatLng, zoom: f64, tile_size: u32) -> Point {
        let scale = tile_size as f64 * 2_f64.powf(zoom);
        let lat_rad = LatLng::clamp_lat(lat_lng.lat).to_radians();

        let x = (lat_lng.lng + 180.0) / 360.0 * scale;
        let y = (1.0 - (PI / 4.0 + lat_rad / 2.0).tan().ln() / PI) / 2.0 * scale;

        Point::new(x, y)
    }

    /// Unprojects world pixel coordinates back to LatLng at the given zoom level
    pub fn unproject(&self, pixel: &Point, zoom: f64) -> LatLng {
        let scale = TILE_SIZE as f64 * 2_f64.powf(zoom);

        let lng = pixel.x / scale * 360.0 - 180.0;
        let n = PI * (1.0 - 2.0 * pixel.y / scale);
        let lat = n.sinh().atan().to_degrees();

        LatLng::new(lat, lng)
    }

    /// World pixel bounds of the viewport when rendered at `zoom` around the current center,
    /// in a world made of `tile_size` pixel tiles.
    /// The top-left corner is rounded to whole pixels the way tiled renderers snap their origin.
    pub fn pixel_bounds(&self, zoom: f64, tile_size: u32) -> PixelBounds {
        let center = self.project_at(&self.center, zoom, tile_size);
        let half = self.size.multiply(0.5);
        let min = center.subtract(&half).round();
        let max = min.add(&self.size);
        PixelBounds::new(min, max)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(LatLng::default(), 0.0, Point::new(TILE_SIZE as f64, TILE_SIZE as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_origin_is_world_center() {
        let viewport = Viewport::default();
        let p = viewport.project(&LatLng::new(0.0, 0.0), 1.0);
        assert!((p.x - 256.0).abs() < 1e-9);
        assert!((p.y - 256.0).abs() < 1e-6);
    }

    #[test]
    fn test_project_unproject_roundtrip() {
        let viewport = Viewport::default();
        let original = LatLng::new(37.7749, -122.4194);
        let pixel = viewport.project(&original, 5.0);
        let back = viewport.unproject(&pixel, 5.0);
        assert!((back.lat - original.lat).abs() < 1e-9);
        assert!((back.lng - original.lng).abs() < 1e-9);
    }

    #[test]
    fn test_pixel_bounds_are_centered() {
        let viewport = Viewport::new(LatLng::new(0.0, 0.0), 1.0, Point::new(200.0, 100.0));
        let bounds = viewport.pixel_bounds(1.0, TILE_SIZE);
        assert_eq!(bounds.min, Point::new(156.0, 206.0));
        assert_eq!(bounds.max, Point::new(356.0, 306.0));
    }

    #[test]
    fn test_pixel_bounds_scale_with_tile_size() {
        let viewport = Viewport::new(LatLng::new(0.0, 0.0), 1.0, Point::new(200.0, 100.0));
        let bounds = viewport.pixel_bounds(1.0, 512);
        assert_eq!(bounds.min, Point::new(412.0, 462.0));
        assert_eq!(bounds.max, Point::new(612.0, 562.0));
    }

    #[test]
    fn test_pan_by_moves_pixel_bounds() {
        let mut viewport = Viewport::new(LatLng::new(0.0, 0.0), 2.0, Point::new(200.0, 100.0));
        let before = viewport.pixel_bounds(2.0, TILE_SIZE);
        viewport.pan_by(Point::new(300.0, 0.0));
        let after = viewport.pixel_bounds(2.0, TILE_SIZE);
        assert!((after.min.x - before.min.x - 300.0).abs() <= 1.0);
    }
}
