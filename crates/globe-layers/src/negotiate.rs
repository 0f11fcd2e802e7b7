//! Capability negotiation.
//!
//! Pure policy over a parsed capabilities document: pick the coordinate
//! system and image format, carry the advertised coverage into the level
//! configuration, and derive how many pyramid levels the layer's scale
//! information justifies.

use globe_common::{wgs84, LevelSetConfig, Sector};
use tracing::debug;
use wms_capabilities::{WmsCapabilities, WmsLayerEntry};

use crate::error::LayerError;
use crate::wms_tile::WmsLayerConfig;

/// Size of one pixel at the reference scale, in meters (OGC convention).
const OGC_PIXEL_SIZE_METERS: f64 = 0.00028;

/// Ground sampling assumed when a layer advertises no scale information.
const DEFAULT_METERS_PER_PIXEL: f64 = 10.0;

/// A complete negotiation result: everything needed to build a tile source.
#[derive(Debug, Clone)]
pub struct NegotiatedLayer {
    pub config: WmsLayerConfig,
    pub levels: LevelSetConfig,
    /// Human-readable title the service advertises for the layer.
    pub title: Option<String>,
}

/// Negotiate request parameters for `layer_name` against a capabilities
/// document.
pub fn negotiate_wms_layer(
    caps: &WmsCapabilities,
    layer_name: &str,
) -> Result<NegotiatedLayer, LayerError> {
    let get_map_url = caps.get_map_url().ok_or(LayerError::EndpointUnresolved)?;

    let layer = caps
        .layer_by_name(layer_name)
        .ok_or_else(|| LayerError::LayerNotFound(layer_name.to_string()))?;

    let coordinate_system = select_coordinate_system(layer, layer_name)?;
    let image_format = select_image_format(caps)?;

    let mut levels = LevelSetConfig {
        sector: layer.geographic_bbox.unwrap_or_else(Sector::full_sphere),
        ..LevelSetConfig::default()
    };
    levels.num_levels = tier_count(&levels, layer);

    let mut config = WmsLayerConfig::new(get_map_url, layer_name);
    config.wms_version = caps.version.clone();
    config.coordinate_system = coordinate_system.to_string();
    config.image_format = image_format.to_string();

    debug!(
        layer = %layer_name,
        version = %config.wms_version,
        crs = %config.coordinate_system,
        format = %config.image_format,
        levels = levels.num_levels,
        "Negotiated WMS layer"
    );

    Ok(NegotiatedLayer {
        config,
        levels,
        title: layer.title.clone(),
    })
}

/// Prefer EPSG:4326, fall back to CRS:84.
fn select_coordinate_system(
    layer: &WmsLayerEntry,
    layer_name: &str,
) -> Result<&'static str, LayerError> {
    if layer.supports_crs("EPSG:4326") {
        Ok("EPSG:4326")
    } else if layer.supports_crs("CRS:84") {
        Ok("CRS:84")
    } else {
        Err(LayerError::IncompatibleCrs(layer_name.to_string()))
    }
}

/// Prefer image/png, fall back to the first advertised format.
fn select_image_format(caps: &WmsCapabilities) -> Result<&str, LayerError> {
    let formats = caps.image_formats();
    if formats.iter().any(|format| format == "image/png") {
        return Ok("image/png");
    }
    formats
        .first()
        .map(String::as_str)
        .ok_or(LayerError::NoImageFormat)
}

/// Pyramid depth for a layer's advertised scale information.
///
/// A usable minimum scale denominator wins, then a legacy scale hint, then
/// a default sampling of [`DEFAULT_METERS_PER_PIXEL`]. Denominators convert
/// to ground distance through the OGC reference pixel. Zero and negative
/// values fall through to the next rule.
fn tier_count(levels: &LevelSetConfig, layer: &WmsLayerEntry) -> usize {
    match layer.min_scale_denominator {
        Some(denominator) if denominator > 0.0 => {
            let meters_per_pixel = denominator * OGC_PIXEL_SIZE_METERS;
            levels.num_levels_for_min_resolution(wgs84::meters_to_radians(meters_per_pixel))
        }
        _ => match layer.min_scale_hint {
            Some(hint) if hint > 0.0 => {
                levels.num_levels_for_min_resolution(wgs84::meters_to_radians(hint))
            }
            _ => levels
                .num_levels_for_resolution(wgs84::meters_to_radians(DEFAULT_METERS_PER_PIXEL)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use wms_capabilities::RequestEndpoint;

    fn entry(name: &str) -> WmsLayerEntry {
        WmsLayerEntry {
            name: Some(name.to_string()),
            title: Some(format!("{name} title")),
            crs: vec!["EPSG:4326".to_string(), "CRS:84".to_string()],
            ..WmsLayerEntry::default()
        }
    }

    fn caps_with(layers: Vec<WmsLayerEntry>) -> WmsCapabilities {
        WmsCapabilities {
            version: "1.3.0".to_string(),
            service_title: Some("Test WMS".to_string()),
            get_capabilities: RequestEndpoint::default(),
            get_map: RequestEndpoint {
                get_url: Some("https://example.com/wms".to_string()),
                post_url: None,
                formats: vec!["image/jpeg".to_string(), "image/png".to_string()],
            },
            layers,
        }
    }

    #[test]
    fn test_negotiates_version_endpoint_and_title() {
        let caps = caps_with(vec![entry("bluemarble")]);
        let negotiated = negotiate_wms_layer(&caps, "bluemarble").unwrap();

        assert_eq!(negotiated.config.service_address, "https://example.com/wms");
        assert_eq!(negotiated.config.wms_version, "1.3.0");
        assert_eq!(negotiated.config.layer_names, "bluemarble");
        assert_eq!(negotiated.title.as_deref(), Some("bluemarble title"));
    }

    #[test]
    fn test_version_copied_verbatim_even_when_unusual() {
        let mut caps = caps_with(vec![entry("osm")]);
        caps.version = "1.1.1".to_string();
        let negotiated = negotiate_wms_layer(&caps, "osm").unwrap();

        assert_eq!(negotiated.config.wms_version, "1.1.1");
    }

    #[test]
    fn test_missing_get_endpoint_is_rejected() {
        let mut caps = caps_with(vec![entry("osm")]);
        caps.get_map.get_url = None;
        caps.get_map.post_url = Some("https://example.com/wms".to_string());

        let err = negotiate_wms_layer(&caps, "osm").unwrap_err();
        assert!(matches!(err, LayerError::EndpointUnresolved));
    }

    #[test]
    fn test_unknown_layer_is_rejected_by_name() {
        let caps = caps_with(vec![entry("osm")]);
        let err = negotiate_wms_layer(&caps, "missing").unwrap_err();

        match err {
            LayerError::LayerNotFound(name) => assert_eq!(name, "missing"),
            other => panic!("expected LayerNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_prefers_epsg_4326_over_crs_84() {
        let caps = caps_with(vec![entry("osm")]);
        let negotiated = negotiate_wms_layer(&caps, "osm").unwrap();

        assert_eq!(negotiated.config.coordinate_system, "EPSG:4326");
    }

    #[test]
    fn test_falls_back_to_crs_84() {
        let mut layer = entry("osm");
        layer.crs = vec!["CRS:84".to_string(), "EPSG:3857".to_string()];
        let caps = caps_with(vec![layer]);
        let negotiated = negotiate_wms_layer(&caps, "osm").unwrap();

        assert_eq!(negotiated.config.coordinate_system, "CRS:84");
    }

    #[test]
    fn test_unsupported_coordinate_systems_are_rejected() {
        let mut layer = entry("osm");
        layer.crs = vec!["EPSG:3857".to_string()];
        let caps = caps_with(vec![layer]);

        let err = negotiate_wms_layer(&caps, "osm").unwrap_err();
        assert!(matches!(err, LayerError::IncompatibleCrs(name) if name == "osm"));
    }

    #[test]
    fn test_prefers_png_over_earlier_formats() {
        let caps = caps_with(vec![entry("osm")]);
        let negotiated = negotiate_wms_layer(&caps, "osm").unwrap();

        assert_eq!(negotiated.config.image_format, "image/png");
    }

    #[test]
    fn test_first_format_wins_without_png() {
        let mut caps = caps_with(vec![entry("osm")]);
        caps.get_map.formats = vec!["image/jpeg".to_string(), "image/gif".to_string()];
        let negotiated = negotiate_wms_layer(&caps, "osm").unwrap();

        assert_eq!(negotiated.config.image_format, "image/jpeg");
    }

    #[test]
    fn test_no_formats_is_rejected() {
        let mut caps = caps_with(vec![entry("osm")]);
        caps.get_map.formats = Vec::new();

        let err = negotiate_wms_layer(&caps, "osm").unwrap_err();
        assert!(matches!(err, LayerError::NoImageFormat));
    }

    #[test]
    fn test_advertised_bbox_becomes_level_sector() {
        let mut layer = entry("osm");
        layer.geographic_bbox = Some(Sector::new(10.0, 50.0, -120.5, -60.25));
        let caps = caps_with(vec![layer]);
        let negotiated = negotiate_wms_layer(&caps, "osm").unwrap();

        assert_eq!(
            negotiated.levels.sector,
            Sector::new(10.0, 50.0, -120.5, -60.25)
        );
    }

    #[test]
    fn test_missing_bbox_defaults_to_full_sphere() {
        let caps = caps_with(vec![entry("osm")]);
        let negotiated = negotiate_wms_layer(&caps, "osm").unwrap();

        assert_eq!(negotiated.levels.sector, Sector::full_sphere());
    }

    #[test]
    fn test_scale_denominator_drives_level_count() {
        // 35e6 * 0.00028 m/px = 9800 m/px, just under two halvings from the
        // default first-level resolution, so the ceiling lands on 3 levels.
        let mut layer = entry("osm");
        layer.min_scale_denominator = Some(35_000_000.0);
        let caps = caps_with(vec![layer]);
        let negotiated = negotiate_wms_layer(&caps, "osm").unwrap();

        assert_eq!(negotiated.levels.num_levels, 3);
    }

    #[test]
    fn test_scale_denominator_wins_over_scale_hint() {
        let mut layer = entry("osm");
        layer.min_scale_denominator = Some(35_000_000.0);
        layer.min_scale_hint = Some(1.0);
        let caps = caps_with(vec![layer]);
        let negotiated = negotiate_wms_layer(&caps, "osm").unwrap();

        assert_eq!(negotiated.levels.num_levels, 3);
    }

    #[test]
    fn test_scale_hint_used_when_denominator_unusable() {
        // Same ground distance as the 35e6 denominator, expressed directly.
        let mut layer = entry("osm");
        layer.min_scale_denominator = Some(0.0);
        layer.min_scale_hint = Some(9_800.0);
        let caps = caps_with(vec![layer]);
        let negotiated = negotiate_wms_layer(&caps, "osm").unwrap();

        assert_eq!(negotiated.levels.num_levels, 3);
    }

    #[test]
    fn test_no_scale_information_defaults_to_ten_meter_sampling() {
        let caps = caps_with(vec![entry("osm")]);
        let negotiated = negotiate_wms_layer(&caps, "osm").unwrap();

        assert_eq!(negotiated.levels.num_levels, 13);
    }

    #[test]
    fn test_negative_scale_values_fall_through_to_default() {
        let mut layer = entry("osm");
        layer.min_scale_denominator = Some(-5.0);
        layer.min_scale_hint = Some(-1.0);
        let caps = caps_with(vec![layer]);
        let negotiated = negotiate_wms_layer(&caps, "osm").unwrap();

        assert_eq!(negotiated.levels.num_levels, 13);
    }

    #[test]
    fn test_nested_layer_is_negotiable() {
        let mut parent = entry("parent");
        parent.name = None;
        let mut child = entry("child");
        child.min_scale_denominator = Some(35_000_000.0);
        parent.children.push(child);
        let caps = caps_with(vec![parent]);

        let negotiated = negotiate_wms_layer(&caps, "child").unwrap();
        assert_eq!(negotiated.config.layer_names, "child");
        assert_eq!(negotiated.levels.num_levels, 3);
    }
}
