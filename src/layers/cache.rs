use crate::core::month::Month;
use crate::layers::surface::MapSurface;
use crate::prelude::HashSet;
use lru::LruCache;

/// Tile layer bound to one month
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthLayer {
    pub month: Month,
    /// Template with `{month}` substituted and tile placeholders left in place
    pub url: String,
}

impl MonthLayer {
    pub fn new(month: Month, url: impl Into<String>) -> Self {
        Self { month, url: url.into() }
    }
}

/// Month layers ordered by recency of use
#[derive(Debug)]
pub struct LayerCache {
    layers: LruCache<Month, MonthLayer>,
}

impl LayerCache {
    pub fn new() -> Self {
        Self {
            layers: LruCache::unbounded(),
        }
    }

    /// Returns the layer for `month`, creating it or repointing its URL as
    /// needed, and marks the month most recently used
    pub fn get_or_create<S>(&mut self, month: Month, url: &str, surface: &mut S) -> MonthLayer
    where
        S: MapSurface + ?Sized,
    {
        if let Some(layer) = self.layers.get_mut(&month) {
            if layer.url != url {
                layer.url = url.to_string();
                if surface.has_layer(month) {
                    surface.set_layer_url(month, url);
                }
            }
            return layer.clone();
        }
        let layer = MonthLayer::new(month, url);
        self.layers.put(month, layer.clone());
        layer
    }

    pub fn contains(&self, month: Month) -> bool {
        self.layers.contains(&month)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Cached months, least recently used first
    pub fn months(&self) -> Vec<Month> {
        self.layers.iter().rev().map(|(month, _)| *month).collect()
    }

    /// Evicts least recently used months outside `keep` until at most
    /// `max(max_layers, keep.len())` remain. Evicted layers are detached.
    pub fn prune<S>(&mut self, keep: &HashSet<Month>, max_layers: usize, surface: &mut S) -> Vec<Month>
    where
        S: MapSurface + ?Sized,
    {
        let max_allowed = max_layers.max(keep.len());
        let mut evicted = Vec::new();
        while self.layers.len() > max_allowed {
            let victim = self
                .layers
                .iter()
                .rev()
                .map(|(month, _)| *month)
                .find(|month| !keep.contains(month));
            let Some(month) = victim else {
                break;
            };
            self.layers.pop(&month);
            if surface.has_layer(month) {
                surface.remove_layer(month);
            }
            evicted.push(month);
        }
        if !evicted.is_empty() {
            log::debug!("evicted month layers {:?}", evicted);
        }
        evicted
    }
}

impl Default for LayerCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::{LatLng, Point};
    use crate::core::viewport::Viewport;
    use crate::layers::headless::HeadlessMap;
    use crate::tiles::sampler::ViewSampler;

    fn m(s: &str) -> Month {
        s.parse().unwrap()
    }

    fn surface() -> HeadlessMap {
        let viewport = Viewport::new(LatLng::new(0.0, 0.0), 0.0, Point::new(256.0, 256.0));
        HeadlessMap::new(viewport, ViewSampler::new(0, 5, 256))
    }

    #[test]
    fn test_get_or_create_promotes_and_repoints() {
        let mut cache = LayerCache::new();
        let mut map = surface();
        cache.get_or_create(m("2000-01"), "a/2000-01", &mut map);
        cache.get_or_create(m("2000-02"), "a/2000-02", &mut map);
        cache.get_or_create(m("2000-01"), "a/2000-01", &mut map);
        assert_eq!(cache.months(), vec![m("2000-02"), m("2000-01")]);

        let layer = cache.get_or_create(m("2000-02"), "b/2000-02", &mut map);
        assert_eq!(layer.url, "b/2000-02");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_prune_skips_kept_months() {
        let mut cache = LayerCache::new();
        let mut map = surface();
        for month in ["2000-01", "2000-02", "2000-03", "2000-04", "2000-05"] {
            let layer = cache.get_or_create(m(month), month, &mut map);
            map.add_layer(&layer);
        }
        let keep: HashSet<Month> = [m("2000-01"), m("2000-04"), m("2000-05")].into_iter().collect();
        let evicted = cache.prune(&keep, 3, &mut map);
        assert_eq!(evicted, vec![m("2000-02"), m("2000-03")]);
        assert_eq!(cache.months(), vec![m("2000-01"), m("2000-04"), m("2000-05")]);
        assert!(!map.has_layer(m("2000-02")));
        assert!(map.has_layer(m("2000-01")));
    }

    #[test]
    fn test_prune_allows_keep_set_larger_than_limit() {
        let mut cache = LayerCache::new();
        let mut map = surface();
        for month in ["2000-01", "2000-02", "2000-03", "2000-04"] {
            cache.get_or_create(m(month), month, &mut map);
        }
        let keep: HashSet<Month> = cache.months().into_iter().collect();
        assert!(cache.prune(&keep, 3, &mut map).is_empty());
        assert_eq!(cache.len(), 4);
    }
}
