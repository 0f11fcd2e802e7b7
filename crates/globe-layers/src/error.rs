//! Error taxonomy for layer creation and resolution.

use thiserror::Error;

use wms_capabilities::CapabilitiesError;

use crate::fetch::FetchError;

/// Everything that can go wrong between a creation call and its outcome.
///
/// Variants up to [`SchedulerSaturated`](Self::SchedulerSaturated) are
/// reported on the calling thread; the rest travel through the completion
/// channel and reach the caller via
/// [`CreationCallback::creation_failed`](crate::CreationCallback::creation_failed).
#[derive(Debug, Error)]
pub enum LayerError {
    /// A required argument was missing or empty. Returned synchronously by
    /// the creation call; the callback never fires for this case.
    #[error("Missing or empty argument: {0}")]
    MissingArgument(&'static str),

    /// The task service refused the resolution task. Delivered through the
    /// failure callback before the creation call returns.
    #[error("Task service saturated, layer resolution rejected")]
    SchedulerSaturated,

    /// The capabilities request failed at the HTTP level.
    #[error("Capabilities request failed: {0}")]
    Fetch(#[from] FetchError),

    /// The capabilities document could not be parsed.
    #[error("Capabilities document invalid: {0}")]
    Parse(#[from] CapabilitiesError),

    /// The document advertises no HTTP GET binding for GetMap.
    #[error("Capabilities advertise no GetMap GET endpoint")]
    EndpointUnresolved,

    /// No layer with the requested name exists in the document.
    #[error("Layer not found in capabilities: {0}")]
    LayerNotFound(String),

    /// The layer supports neither EPSG:4326 nor CRS:84.
    #[error("No compatible coordinate system for layer: {0}")]
    IncompatibleCrs(String),

    /// The service advertises no image formats for GetMap.
    #[error("Capabilities advertise no GetMap image format")]
    NoImageFormat,

    /// GeoPackage resolution is declared but not wired up.
    #[error("GeoPackage layer resolution is not supported")]
    GeoPackageUnsupported,

    /// A fault escaped the resolution steps and was caught at the task
    /// boundary.
    #[error("Layer resolution failed internally: {0}")]
    Internal(String),
}
