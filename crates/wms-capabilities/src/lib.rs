//! WMS GetCapabilities document model and parser.
//!
//! Supports the two dialects in common deployment: WMS 1.3.0
//! (`WMS_Capabilities`) and WMS 1.1.1 (`WMT_MS_Capabilities`).

pub mod model;
pub mod parse;

pub use model::{RequestEndpoint, WmsCapabilities, WmsLayerEntry};
pub use parse::CapabilitiesError;
