use crate::core::geo::{TileCoord, TileKey};
use crate::core::month::Month;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Values substituted into a tile URL template
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileUrlParams {
    pub month: Month,
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileUrlParams {
    pub fn new(month: Month, coord: TileCoord) -> Self {
        Self { month, z: coord.z, x: coord.x, y: coord.y }
    }
}

/// Replaces the first occurrence of each of `{month}`, `{z}`, `{x}` and `{y}`.
pub fn fill_template(template: &str, values: &TileUrlParams) -> String {
    template
        .replacen("{month}", &values.month.to_string(), 1)
        .replacen("{z}", &values.z.to_string(), 1)
        .replacen("{x}", &values.x.to_string(), 1)
        .replacen("{y}", &values.y.to_string(), 1)
}

/// URL template with `{month}`, `{z}`, `{x}`, `{y}` placeholders
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UrlTemplate(String);

impl UrlTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Template bound to one month, leaving the tile placeholders in place
    pub fn month_url(&self, month: Month) -> String {
        self.0.replacen("{month}", &month.to_string(), 1)
    }

    pub fn tile_url(&self, month: Month, coord: TileCoord) -> String {
        fill_template(&self.0, &TileUrlParams::new(month, coord))
    }
}

impl fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Recovers a tile identity from a resolved URL ending in `/z/x/y.ext`,
/// optionally followed by a query string or fragment.
pub fn tile_key_from_url(url: &str) -> Option<TileKey> {
    let path = match url.find(&['?', '#'][..]) {
        Some(idx) => &url[..idx],
        None => url,
    };
    let mut segments = path.rsplit('/');
    let file = segments.next()?;
    let x_str = segments.next()?;
    let z_str = segments.next()?;
    // z must itself be preceded by a slash
    segments.next()?;
    let (y_str, ext) = file.split_once('.')?;
    if ext.is_empty() || !all_digits(y_str) || !all_digits(x_str) || !all_digits(z_str) {
        return None;
    }
    let z: u8 = z_str.parse().ok()?;
    let x: u32 = x_str.parse().ok()?;
    let y: u32 = y_str.parse().ok()?;
    Some(TileCoord::new(x, y, z))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month() -> Month {
        "2000-01".parse().unwrap()
    }

    #[test]
    fn test_fill_template() {
        let url = fill_template(
            "https://tiles.example/{month}/{z}/{x}/{y}.png",
            &TileUrlParams { month: month(), z: 3, x: 4, y: 5 },
        );
        assert_eq!(url, "https://tiles.example/2000-01/3/4/5.png");
    }

    #[test]
    fn test_month_url_keeps_tile_placeholders() {
        let template = UrlTemplate::new("https://t/{month}/{z}/{x}/{y}.png");
        assert_eq!(template.month_url(month()), "https://t/2000-01/{z}/{x}/{y}.png");
    }

    #[test]
    fn test_template_without_placeholders_is_untouched() {
        let url = fill_template("https://static/tile.png", &TileUrlParams { month: month(), z: 0, x: 0, y: 0 });
        assert_eq!(url, "https://static/tile.png");
    }

    #[test]
    fn test_tile_key_from_url() {
        assert_eq!(
            tile_key_from_url("https://t/2000-01/3/4/5.png"),
            Some(TileCoord::new(4, 5, 3))
        );
        assert_eq!(
            tile_key_from_url("https://t/2000-01/3/4/5.png?v=2#frag"),
            Some(TileCoord::new(4, 5, 3))
        );
        assert_eq!(tile_key_from_url("https://t/3/4/5"), None);
        assert_eq!(tile_key_from_url("https://t/3/x/5.png"), None);
        assert_eq!(tile_key_from_url(""), None);
    }

    #[test]
    fn test_url_key_matches_filled_coordinate() {
        let template = UrlTemplate::new("https://t/{month}/{z}/{x}/{y}.webp");
        let coord = TileCoord::new(17, 9, 5);
        assert_eq!(tile_key_from_url(&template.tile_url(month(), coord)), Some(coord));
    }
}
