//! WMS GetMap URL construction.

use globe_common::Sector;
use serde::Serialize;

use crate::tile_source::TileUrlFactory;

/// Negotiated parameters for a WMS tile source.
#[derive(Debug, Clone, Serialize)]
pub struct WmsLayerConfig {
    /// GetMap endpoint; may already carry a query string.
    pub service_address: String,
    /// Protocol version, copied verbatim from the capabilities document.
    pub wms_version: String,
    /// Comma-separated layer names for the LAYERS parameter.
    pub layer_names: String,
    /// Comma-separated style names; an empty STYLES parameter when absent.
    pub style_names: Option<String>,
    /// Coordinate reference for the CRS (1.3.0) or SRS (older) parameter.
    pub coordinate_system: String,
    /// MIME type for the FORMAT parameter.
    pub image_format: String,
    /// Request tiles with a transparent background.
    pub transparent: bool,
    /// Value for the TIME parameter on time-dependent layers.
    pub time_string: Option<String>,
}

impl WmsLayerConfig {
    /// Configuration with conventional defaults: WMS 1.3.0, EPSG:4326,
    /// transparent PNG tiles.
    pub fn new(service_address: impl Into<String>, layer_names: impl Into<String>) -> Self {
        Self {
            service_address: service_address.into(),
            wms_version: "1.3.0".to_string(),
            layer_names: layer_names.into(),
            style_names: None,
            coordinate_system: "EPSG:4326".to_string(),
            image_format: "image/png".to_string(),
            transparent: true,
            time_string: None,
        }
    }
}

/// Builds GetMap KVP URLs for a fixed layer configuration.
#[derive(Debug, Clone)]
pub struct WmsTileFactory {
    config: WmsLayerConfig,
}

impl WmsTileFactory {
    pub fn new(config: WmsLayerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WmsLayerConfig {
        &self.config
    }
}

impl TileUrlFactory for WmsTileFactory {
    fn url_for_tile(&self, sector: &Sector, width: u32, height: u32) -> String {
        let config = &self.config;
        let mut params: Vec<String> = Vec::with_capacity(12);

        // A proxied address may already hard-wire SERVICE=WMS.
        if !config.service_address.to_uppercase().contains("SERVICE=WMS") {
            params.push("SERVICE=WMS".to_string());
        }

        params.push(format!("VERSION={}", config.wms_version));
        params.push("REQUEST=GetMap".to_string());
        params.push(format!("LAYERS={}", config.layer_names));
        params.push(format!(
            "STYLES={}",
            config.style_names.as_deref().unwrap_or("")
        ));

        let is_130 = config.wms_version == "1.3.0";
        if is_130 {
            params.push(format!("CRS={}", config.coordinate_system));
        } else {
            params.push(format!("SRS={}", config.coordinate_system));
        }

        // WMS 1.3.0 with EPSG:4326 takes the BBOX in lat,lon axis order.
        // Every other combination takes lon,lat.
        if is_130 && config.coordinate_system == "EPSG:4326" {
            params.push(format!(
                "BBOX={},{},{},{}",
                sector.min_lat, sector.min_lon, sector.max_lat, sector.max_lon
            ));
        } else {
            params.push(format!(
                "BBOX={},{},{},{}",
                sector.min_lon, sector.min_lat, sector.max_lon, sector.max_lat
            ));
        }

        params.push(format!("WIDTH={width}"));
        params.push(format!("HEIGHT={height}"));
        params.push(format!("FORMAT={}", config.image_format));
        params.push(format!(
            "TRANSPARENT={}",
            if config.transparent { "TRUE" } else { "FALSE" }
        ));

        if let Some(time) = &config.time_string {
            if !time.is_empty() {
                params.push(format!("TIME={time}"));
            }
        }

        format!(
            "{}{}{}",
            config.service_address,
            query_separator(&config.service_address),
            params.join("&")
        )
    }
}

/// The GetCapabilities request URL for a WMS service address.
///
/// The address may be bare or already carry a query string; the request
/// parameters are appended with the right separator either way.
pub fn capabilities_request_url(service_address: &str) -> String {
    format!(
        "{}{}VERSION=1.3.0&SERVICE=WMS&REQUEST=GetCapabilities",
        service_address,
        query_separator(service_address)
    )
}

/// Separator needed between an address and appended KVP parameters.
fn query_separator(address: &str) -> &'static str {
    if address.contains('?') {
        if address.ends_with('?') || address.ends_with('&') {
            ""
        } else {
            "&"
        }
    } else {
        "?"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_sector() -> Sector {
        Sector::new(10.0, 50.0, -120.0, -60.0)
    }

    #[test]
    fn test_url_contains_standard_parameters() {
        let factory = WmsTileFactory::new(WmsLayerConfig::new(
            "https://example.com/wms",
            "bluemarble",
        ));
        let url = factory.url_for_tile(&test_sector(), 256, 256);

        assert!(url.starts_with("https://example.com/wms?SERVICE=WMS&VERSION=1.3.0"));
        assert!(url.contains("&REQUEST=GetMap"));
        assert!(url.contains("&LAYERS=bluemarble"));
        assert!(url.contains("&STYLES=&"));
        assert!(url.contains("&WIDTH=256"));
        assert!(url.contains("&HEIGHT=256"));
        assert!(url.contains("&FORMAT=image/png"));
        assert!(url.contains("&TRANSPARENT=TRUE"));
        assert!(!url.contains("TIME="));
    }

    #[test]
    fn test_version_130_epsg4326_uses_lat_lon_axis_order() {
        let factory = WmsTileFactory::new(WmsLayerConfig::new(
            "https://example.com/wms",
            "bluemarble",
        ));
        let url = factory.url_for_tile(&test_sector(), 256, 256);

        assert!(url.contains("&CRS=EPSG:4326"));
        assert!(url.contains("&BBOX=10,-120,50,-60"));
    }

    #[test]
    fn test_version_130_crs84_uses_lon_lat_axis_order() {
        let mut config = WmsLayerConfig::new("https://example.com/wms", "bluemarble");
        config.coordinate_system = "CRS:84".to_string();
        let url = WmsTileFactory::new(config).url_for_tile(&test_sector(), 256, 256);

        assert!(url.contains("&CRS=CRS:84"));
        assert!(url.contains("&BBOX=-120,10,-60,50"));
    }

    #[test]
    fn test_version_111_uses_srs_and_lon_lat_axis_order() {
        let mut config = WmsLayerConfig::new("https://example.com/wms", "bluemarble");
        config.wms_version = "1.1.1".to_string();
        let url = WmsTileFactory::new(config).url_for_tile(&test_sector(), 256, 256);

        assert!(url.contains("&SRS=EPSG:4326"));
        assert!(!url.contains("CRS=EPSG"));
        assert!(url.contains("&BBOX=-120,10,-60,50"));
    }

    #[test]
    fn test_appends_to_existing_query_string() {
        let factory = WmsTileFactory::new(WmsLayerConfig::new(
            "https://example.com/wms?map=topo",
            "bluemarble",
        ));
        let url = factory.url_for_tile(&test_sector(), 256, 256);

        assert!(url.starts_with("https://example.com/wms?map=topo&SERVICE=WMS&"));
        assert!(!url.contains("&&"));
    }

    #[test]
    fn test_trailing_question_mark_gets_no_extra_separator() {
        let factory =
            WmsTileFactory::new(WmsLayerConfig::new("https://example.com/wms?", "osm"));
        let url = factory.url_for_tile(&test_sector(), 256, 256);

        assert!(url.starts_with("https://example.com/wms?SERVICE=WMS&"));
    }

    #[test]
    fn test_service_parameter_not_duplicated() {
        let factory = WmsTileFactory::new(WmsLayerConfig::new(
            "https://example.com/wms?service=wms",
            "osm",
        ));
        let url = factory.url_for_tile(&test_sector(), 256, 256);

        assert_eq!(url.matches("VERSION=").count(), 1);
        assert!(url.starts_with("https://example.com/wms?service=wms&VERSION=1.3.0"));
    }

    #[test]
    fn test_styles_and_time_included_when_set() {
        let mut config = WmsLayerConfig::new("https://example.com/wms", "sst");
        config.style_names = Some("boxfill/rainbow".to_string());
        config.time_string = Some("2020-01-01T00:00:00Z".to_string());
        let url = WmsTileFactory::new(config).url_for_tile(&test_sector(), 512, 512);

        assert!(url.contains("&STYLES=boxfill/rainbow&"));
        assert!(url.contains("&TIME=2020-01-01T00:00:00Z"));
    }

    #[test]
    fn test_opaque_layer_requests_transparent_false() {
        let mut config = WmsLayerConfig::new("https://example.com/wms", "base");
        config.transparent = false;
        let url = WmsTileFactory::new(config).url_for_tile(&test_sector(), 256, 256);

        assert!(url.contains("&TRANSPARENT=FALSE"));
    }

    #[test]
    fn test_capabilities_request_url_variants() {
        assert_eq!(
            capabilities_request_url("https://example.com/wms"),
            "https://example.com/wms?VERSION=1.3.0&SERVICE=WMS&REQUEST=GetCapabilities"
        );
        assert_eq!(
            capabilities_request_url("https://example.com/wms?map=a"),
            "https://example.com/wms?map=a&VERSION=1.3.0&SERVICE=WMS&REQUEST=GetCapabilities"
        );
        assert_eq!(
            capabilities_request_url("https://example.com/wms?"),
            "https://example.com/wms?VERSION=1.3.0&SERVICE=WMS&REQUEST=GetCapabilities"
        );
    }
}
