//! Capabilities document model.

use globe_common::Sector;
use serde::Serialize;

/// A capabilities document reduced to the fields layer resolution needs.
#[derive(Debug, Clone, Serialize)]
pub struct WmsCapabilities {
    /// Version string exactly as the document advertises it.
    pub version: String,

    /// Service title, when the document carries one.
    pub service_title: Option<String>,

    /// The GetCapabilities operation endpoint.
    pub get_capabilities: RequestEndpoint,

    /// The GetMap operation endpoint.
    pub get_map: RequestEndpoint,

    /// Root layers in document order.
    pub layers: Vec<WmsLayerEntry>,
}

impl WmsCapabilities {
    /// Find a layer by its exact advertised name, anywhere in the tree.
    pub fn layer_by_name(&self, name: &str) -> Option<&WmsLayerEntry> {
        fn walk<'a>(layers: &'a [WmsLayerEntry], name: &str) -> Option<&'a WmsLayerEntry> {
            for layer in layers {
                if layer.name.as_deref() == Some(name) {
                    return Some(layer);
                }
                if let Some(found) = walk(&layer.children, name) {
                    return Some(found);
                }
            }
            None
        }
        walk(&self.layers, name)
    }

    /// All requestable (named) layers, flattened in document order.
    pub fn named_layers(&self) -> Vec<&WmsLayerEntry> {
        fn walk<'a>(layers: &'a [WmsLayerEntry], out: &mut Vec<&'a WmsLayerEntry>) {
            for layer in layers {
                if layer.name.is_some() {
                    out.push(layer);
                }
                walk(&layer.children, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.layers, &mut out);
        out
    }

    /// Image formats advertised for GetMap, in document order.
    pub fn image_formats(&self) -> &[String] {
        &self.get_map.formats
    }

    /// URL for the HTTP GET binding of GetMap, when advertised.
    pub fn get_map_url(&self) -> Option<&str> {
        self.get_map.get_url.as_deref()
    }
}

/// One operation from the Capability/Request section.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestEndpoint {
    /// URL of the HTTP GET binding.
    pub get_url: Option<String>,

    /// URL of the HTTP POST binding.
    pub post_url: Option<String>,

    /// Formats advertised for this operation, in document order.
    pub formats: Vec<String>,
}

/// A Layer element with WMS inheritance already applied.
///
/// Coordinate reference systems accumulate down the tree; bounding boxes and
/// scale values replace-inherit. The stored values are effective values, so
/// consumers never need to walk back up to a parent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WmsLayerEntry {
    /// Advertised name. Only named layers are requestable.
    pub name: Option<String>,

    /// Human-readable title.
    pub title: Option<String>,

    /// Effective CRS identifiers (own plus inherited), document order.
    pub crs: Vec<String>,

    /// Effective geographic extent in degrees.
    pub geographic_bbox: Option<Sector>,

    /// Minimum scale denominator (WMS 1.3.0).
    pub min_scale_denominator: Option<f64>,

    /// Maximum scale denominator (WMS 1.3.0).
    pub max_scale_denominator: Option<f64>,

    /// Minimum ground resolution hint in meters per pixel (WMS 1.1.1).
    pub min_scale_hint: Option<f64>,

    /// Maximum ground resolution hint in meters per pixel (WMS 1.1.1).
    pub max_scale_hint: Option<f64>,

    /// Nested layers in document order.
    pub children: Vec<WmsLayerEntry>,
}

impl WmsLayerEntry {
    /// Check whether this layer advertises the given CRS identifier.
    ///
    /// Comparison is exact: WMS identifiers like `EPSG:4326` and `CRS:84`
    /// are distinct codes, not aliases.
    pub fn supports_crs(&self, code: &str) -> bool {
        self.crs.iter().any(|c| c == code)
    }
}
