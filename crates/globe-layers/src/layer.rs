//! The caller-visible layer container.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::OnceCell;
use tracing::warn;

use crate::tile_source::TiledImageSource;

/// A displayable layer, created empty and populated exactly once when
/// resolution completes.
///
/// The container is shared: the creation call returns one `Arc` reference
/// immediately and the resolution pipeline holds another until the outcome
/// is delivered. A layer whose resolution failed simply never resolves.
pub struct ImageLayer {
    name: String,
    display_name: OnceCell<String>,
    pick_enabled: AtomicBool,
    source: OnceCell<TiledImageSource>,
}

impl ImageLayer {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: OnceCell::new(),
            // Imagery layers ignore picking unless a caller opts in.
            pick_enabled: AtomicBool::new(false),
            source: OnceCell::new(),
        }
    }

    /// The name requested at creation time.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The title the service advertises for this layer, once resolved.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.get().map(String::as_str)
    }

    pub(crate) fn set_display_name(&self, name: String) {
        let _ = self.display_name.set(name);
    }

    pub fn pick_enabled(&self) -> bool {
        self.pick_enabled.load(Ordering::Relaxed)
    }

    pub fn set_pick_enabled(&self, enabled: bool) {
        self.pick_enabled.store(enabled, Ordering::Relaxed);
    }

    /// The resolved tile source, present only after a successful outcome
    /// has been delivered.
    pub fn source(&self) -> Option<&TiledImageSource> {
        self.source.get()
    }

    pub fn is_resolved(&self) -> bool {
        self.source.get().is_some()
    }

    pub(crate) fn attach_source(&self, source: TiledImageSource) {
        if self.source.set(source).is_err() {
            warn!(layer = %self.name, "Layer already has a tile source, ignoring duplicate");
        }
    }
}

impl fmt::Debug for ImageLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageLayer")
            .field("name", &self.name)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use globe_common::{LevelSet, LevelSetConfig};

    use crate::wms_tile::{WmsLayerConfig, WmsTileFactory};

    fn test_source(num_levels: usize) -> TiledImageSource {
        let config = LevelSetConfig {
            num_levels,
            ..LevelSetConfig::default()
        };
        let level_set = LevelSet::from_config(&config).unwrap();
        let factory = WmsTileFactory::new(WmsLayerConfig::new(
            "https://example.com/wms",
            "test-layer",
        ));
        TiledImageSource::new(factory, level_set)
    }

    #[test]
    fn test_new_layer_is_unresolved_and_unpickable() {
        let layer = ImageLayer::new("osm");
        assert_eq!(layer.name(), "osm");
        assert!(!layer.is_resolved());
        assert!(layer.source().is_none());
        assert!(layer.display_name().is_none());
        assert!(!layer.pick_enabled());
    }

    #[test]
    fn test_display_name_set_once() {
        let layer = ImageLayer::new("osm");
        layer.set_display_name("OpenStreetMap".to_string());
        layer.set_display_name("Other".to_string());
        assert_eq!(layer.display_name(), Some("OpenStreetMap"));
    }

    #[test]
    fn test_attach_source_resolves_layer() {
        let layer = ImageLayer::new("osm");
        layer.attach_source(test_source(3));

        assert!(layer.is_resolved());
        assert_eq!(layer.source().unwrap().level_set().num_levels(), 3);
    }

    #[test]
    fn test_duplicate_attach_keeps_first_source() {
        let layer = ImageLayer::new("osm");
        layer.attach_source(test_source(3));
        layer.attach_source(test_source(7));

        assert_eq!(layer.source().unwrap().level_set().num_levels(), 3);
    }

    #[test]
    fn test_pick_enabled_round_trip() {
        let layer = ImageLayer::new("osm");
        layer.set_pick_enabled(true);
        assert!(layer.pick_enabled());
        layer.set_pick_enabled(false);
        assert!(!layer.pick_enabled());
    }
}
