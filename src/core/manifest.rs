//! Manifest model and the four fields the viewer consumes from it.
//!
//! Fetching the manifest is the host's job; this module only turns an
//! already-downloaded document into a [`TimeSeriesSource`].

use crate::core::constants::{
    COVERAGE_END_MONTH, COVERAGE_START_MONTH, DEFAULT_MAX_NATIVE_ZOOM, DEFAULT_MIN_NATIVE_ZOOM,
};
use crate::core::month::{Coverage, Month, MonthSequence};
use crate::tiles::source::UrlTemplate;
use crate::{Result, ViewerError};
use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub month_range: Option<MonthRange>,
    #[serde(default)]
    pub tiles: Option<TilesSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonthRange {
    #[serde(default)]
    pub months: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TilesSection {
    #[serde(default)]
    pub url_template: Option<String>,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub zoom: Option<ZoomRange>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZoomRange {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl Manifest {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// What the viewer needs to animate a data set
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesSource {
    pub months: MonthSequence,
    pub template: UrlTemplate,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

impl TimeSeriesSource {
    pub fn new(months: MonthSequence, template: UrlTemplate, min_zoom: u8, max_zoom: u8) -> Self {
        Self {
            months,
            template,
            min_zoom: min_zoom.min(max_zoom),
            max_zoom: max_zoom.max(min_zoom),
        }
    }

    /// Default coverage window of the data set
    pub fn default_coverage() -> Result<Coverage> {
        Ok(Coverage::new(COVERAGE_START_MONTH.parse()?, COVERAGE_END_MONTH.parse()?))
    }

    /// Extracts months, template and zoom range; `manifest_url` anchors relative templates
    pub fn from_manifest(manifest: &Manifest, manifest_url: &str, coverage: Coverage) -> Result<Self> {
        let raw_months = manifest
            .month_range
            .as_ref()
            .map(|range| range.months.as_slice())
            .filter(|months| !months.is_empty())
            .ok_or_else(|| ViewerError::Manifest("manifest is missing month_range.months".to_string()))?;

        let mut months: Vec<Month> = raw_months
            .iter()
            .filter_map(|raw| raw.parse::<Month>().ok())
            .filter(|month| coverage.contains(*month))
            .collect();
        months.sort();
        months.dedup();
        if months.is_empty() {
            return Err(ViewerError::Manifest(format!(
                "no months in manifest match coverage window {} to {}",
                coverage.start, coverage.end
            )));
        }

        let tiles = manifest.tiles.as_ref();
        let raw_template = tiles
            .and_then(|tiles| tiles.url_template.as_deref())
            .filter(|template| !template.is_empty())
            .ok_or_else(|| ViewerError::Manifest("manifest is missing tiles.url_template".to_string()))?;

        let zoom = tiles.and_then(|tiles| tiles.zoom.as_ref());
        let min_zoom = zoom_level(zoom.and_then(|z| z.min), DEFAULT_MIN_NATIVE_ZOOM);
        let max_zoom = zoom_level(zoom.and_then(|z| z.max), DEFAULT_MAX_NATIVE_ZOOM);

        let extension = tiles
            .and_then(|tiles| tiles.extension.as_deref().filter(|ext| !ext.is_empty()))
            .or_else(|| tiles.and_then(|tiles| tiles.format.as_deref()));
        let template = normalize_extension(&resolve_template(raw_template, manifest_url)?, extension);
        log::info!("resolved tile template: {}", template);

        Ok(Self::new(MonthSequence::new(months)?, UrlTemplate::new(template), min_zoom, max_zoom))
    }
}

fn zoom_level(value: Option<f64>, fallback: u8) -> u8 {
    match value {
        Some(z) if z.is_finite() => z.round().clamp(0.0, 30.0) as u8,
        _ => fallback,
    }
}

/// Resolves a possibly relative template against the manifest URL.
///
/// The URL parser percent-encodes the braces of the placeholders, so they
/// are put back afterwards.
pub fn resolve_template(template: &str, manifest_url: &str) -> Result<String> {
    let resolved = Url::parse(manifest_url)?.join(template)?;
    Ok(decode_placeholders(resolved.as_str()))
}

fn decode_placeholders(url: &str) -> String {
    let mut out = url.to_string();
    for name in ["month", "z", "x", "y"] {
        for encoded in [format!("%7B{name}%7D"), format!("%7b{name}%7d")] {
            out = out.replace(&encoded, &format!("{{{name}}}"));
        }
    }
    out
}

/// Rewrites the `{y}.ext` suffix to the manifest's declared extension (`jpeg` becomes `jpg`)
pub fn normalize_extension(template: &str, extension: Option<&str>) -> String {
    let ext = extension.map(|ext| ext.trim_start_matches('.')).unwrap_or_default();
    let ext = if ext == "jpeg" { "jpg" } else { ext };
    if ext.is_empty() {
        return template.to_string();
    }
    let Some(pos) = template.find("{y}.") else {
        return template.to_string();
    };
    let start = pos + "{y}.".len();
    let rest = &template[start..];
    let end = rest.find(|c: char| !c.is_ascii_alphanumeric()).unwrap_or(rest.len());
    if end == 0 {
        return template.to_string();
    }
    let tail = &rest[end..];
    // only the final path segment, optionally followed by a query or fragment
    if !(tail.is_empty() || tail.starts_with('?') || tail.starts_with('#')) {
        return template.to_string();
    }
    format!("{}{}{}", &template[..start], ext, tail)
}
