use serde::{Deserialize, Serialize};
use std::fmt;

/// Latitude limit of the Web Mercator projection
const MAX_LATITUDE: f64 = 85.0511287798;

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Clamps latitude to the range Web Mercator can represent
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Represents a point in screen or projected pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(&self, other: &Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn subtract(&self, other: &Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn multiply(&self, scalar: f64) -> Point {
        Point::new(self.x * scalar, self.y * scalar)
    }

    pub fn round(&self) -> Point {
        Point::new(self.x.round(), self.y.round())
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Axis-aligned rectangle in world pixel space at one zoom level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelBounds {
    pub min: Point,
    pub max: Point,
}

impl PixelBounds {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// Inclusive tile index range `(min_x, min_y, max_x, max_y)` covered by these bounds.
    /// Indices may fall outside the world; callers filter them.
    pub fn tile_range(&self, tile_size: u32) -> (i64, i64, i64, i64) {
        let size = tile_size as f64;
        (
            (self.min.x / size).floor() as i64,
            (self.min.y / size).floor() as i64,
            (self.max.x / size).floor() as i64,
            (self.max.y / size).floor() as i64,
        )
    }
}

/// Tile coordinate in the standard XYZ scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

/// Identity of a tile for set membership. Displays as `z:x:y`.
pub type TileKey = TileCoord;

impl TileCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Highest valid x/y index at zoom `z`
    pub fn max_index(z: u8) -> u32 {
        if z >= 32 {
            u32::MAX
        } else {
            ((1u64 << z) - 1) as u32
        }
    }

    /// Builds a coordinate from signed indices, rejecting ones outside `[0, 2^z - 1]`
    pub fn checked(x: i64, y: i64, z: u8) -> Option<Self> {
        let max = Self::max_index(z) as i64;
        if x < 0 || y < 0 || x > max || y > max {
            return None;
        }
        Some(Self::new(x as u32, y as u32, z))
    }

    /// Canonical string form, `z:x:y`
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.z, self.x, self.y)
    }
}
