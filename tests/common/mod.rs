#![allow(dead_code)]

use chronotile::prelude::*;

pub type Viewer = ViewerController<HeadlessMap, DeferredFetcher, PanelState>;

pub const TEMPLATE: &str = "https://tiles.test/{month}/{z}/{x}/{y}.png";

pub fn m(s: &str) -> Month {
    s.parse().unwrap()
}

/// Zoom 1 strip covering tiles x 1 then 0 of row 0
pub fn two_tile_view() -> Viewport {
    Viewport::new(LatLng::new(66.5, 0.0), 1.0, Point::new(200.0, 40.0))
}

/// Zoom 2 strip covering tiles x 0..=3 of row 0
pub fn four_tile_view() -> Viewport {
    Viewport::new(LatLng::new(79.17, 0.0), 2.0, Point::new(600.0, 40.0))
}

/// Months 2000-01 through `last`, served from [`TEMPLATE`]
pub fn viewer_with(viewport: Viewport, last: &str, config: ViewerConfig) -> Viewer {
    let months = MonthSequence::range(m("2000-01"), m(last)).unwrap();
    let source = TimeSeriesSource::new(months, UrlTemplate::new(TEMPLATE), 0, 5);
    let surface = HeadlessMap::new(viewport, ViewSampler::new(0, 5, 256));
    ViewerController::new(source, config, surface, DeferredFetcher::new(), PanelState::new())
}

pub fn viewer(viewport: Viewport) -> Viewer {
    viewer_with(viewport, "2000-06", ViewerConfig::for_testing())
}

/// Settles every outstanding tile of `month`'s layer, failing the ones in
/// `fail`, and forwards the resulting events to the controller
pub fn resolve_month(viewer: &mut Viewer, month: Month, fail: &[TileCoord]) {
    let records = viewer.surface().tile_records(month);
    for record in records {
        let loaded = !fail.contains(&record.coord);
        let events = viewer.surface_mut().resolve_tile(month, record.coord, loaded);
        for event in events {
            viewer.handle_tile_event(event);
        }
    }
}

/// Requests `index`, loads its tiles and renders until the switch is done
pub fn commit(viewer: &mut Viewer, index: usize, at_ms: f64) {
    viewer.request_month(index as i64);
    let month = viewer.state().months().get(index).unwrap();
    resolve_month(viewer, month, &[]);
    viewer.render_frame(at_ms);
    viewer.render_frame(at_ms + 16.0);
}

/// Completes every speculative fetch and applies the results
pub fn finish_prefetch(viewer: &mut Viewer) -> usize {
    let done = viewer.fetcher_mut().complete_all();
    viewer.pump_fetches();
    done
}

pub fn full_opacity(viewer: &Viewer) -> Option<f32> {
    Some(viewer.config().overlay_opacity)
}
