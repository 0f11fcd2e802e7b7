//! Layer creation and asynchronous resolution.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, warn};

use globe_common::LevelSet;
use wms_capabilities::WmsCapabilities;

use crate::completion::{Completion, CompletionSender};
use crate::config::ResolutionConfig;
use crate::error::LayerError;
use crate::fetch::{CapabilitiesFetcher, HttpFetcher};
use crate::layer::ImageLayer;
use crate::negotiate::negotiate_wms_layer;
use crate::tasks::TaskSubmitter;
use crate::tile_source::TiledImageSource;
use crate::wms_tile::{capabilities_request_url, WmsTileFactory};

/// Receives the outcome of a creation call.
///
/// Exactly one of the two methods fires per call, on the thread driving
/// [`LayerCompletions`](crate::LayerCompletions), or on the calling thread
/// itself when submission is rejected outright.
pub trait CreationCallback: Send + Sync {
    fn creation_succeeded(&self, factory: &LayerFactory, layer: &Arc<ImageLayer>);

    fn creation_failed(&self, factory: &LayerFactory, layer: &Arc<ImageLayer>, error: LayerError);
}

/// Creates displayable layers from remote service descriptions.
///
/// Creation calls return a placeholder layer immediately; resolution runs
/// on the task service and the outcome arrives through the completion
/// channel. The factory is cheap to clone and clones share the same task
/// service and channel.
#[derive(Clone)]
pub struct LayerFactory {
    submitter: TaskSubmitter,
    completions: CompletionSender,
    fetcher: Arc<dyn CapabilitiesFetcher>,
}

impl LayerFactory {
    /// Factory with the default HTTP fetcher and timeouts.
    pub fn new(submitter: TaskSubmitter, completions: CompletionSender) -> Self {
        Self::with_config(submitter, completions, &ResolutionConfig::default())
    }

    /// Factory with tuned fetch timeouts.
    pub fn with_config(
        submitter: TaskSubmitter,
        completions: CompletionSender,
        config: &ResolutionConfig,
    ) -> Self {
        Self::with_fetcher(submitter, completions, Arc::new(HttpFetcher::new(config)))
    }

    /// Factory with a custom fetcher implementation.
    pub fn with_fetcher(
        submitter: TaskSubmitter,
        completions: CompletionSender,
        fetcher: Arc<dyn CapabilitiesFetcher>,
    ) -> Self {
        Self {
            submitter,
            completions,
            fetcher,
        }
    }

    /// Create a layer backed by a remote WMS service.
    ///
    /// Returns the placeholder layer right away. Argument problems are
    /// returned as `Err` and the callback never fires; a saturated task
    /// service invokes `creation_failed` synchronously before this returns.
    pub fn create_from_wms(
        &self,
        service_address: &str,
        layer_names: &str,
        callback: Arc<dyn CreationCallback>,
    ) -> Result<Arc<ImageLayer>, LayerError> {
        if service_address.is_empty() {
            return Err(LayerError::MissingArgument("service_address"));
        }
        if layer_names.is_empty() {
            return Err(LayerError::MissingArgument("layer_names"));
        }

        let layer = Arc::new(ImageLayer::new(layer_names));
        debug!(service = %service_address, layer = %layer_names, "Scheduling WMS layer resolution");

        let task = resolve_wms_task(
            self.clone(),
            service_address.to_string(),
            layer_names.to_string(),
            Arc::clone(&layer),
            Arc::clone(&callback),
        );

        if self.submitter.try_submit(task).is_err() {
            warn!(service = %service_address, layer = %layer_names, "Task service saturated, failing layer creation");
            callback.creation_failed(self, &layer, LayerError::SchedulerSaturated);
        }

        Ok(layer)
    }

    /// Create a layer backed by a local GeoPackage archive.
    ///
    /// GeoPackage resolution is not wired up. The request is accepted and
    /// then fails through the callback with
    /// [`LayerError::GeoPackageUnsupported`], so callers are never left
    /// waiting on an outcome that cannot arrive.
    pub fn create_from_geo_package(
        &self,
        path: &str,
        callback: Arc<dyn CreationCallback>,
    ) -> Result<Arc<ImageLayer>, LayerError> {
        if path.is_empty() {
            return Err(LayerError::MissingArgument("path"));
        }

        let layer = Arc::new(ImageLayer::new(path));

        let factory = self.clone();
        let completions = self.completions.clone();
        let task_layer = Arc::clone(&layer);
        let task_callback = Arc::clone(&callback);
        let archive = path.to_string();

        let task = async move {
            warn!(path = %archive, "GeoPackage layer resolution is not implemented");
            completions.send(Completion::Failure {
                factory,
                layer: task_layer,
                error: LayerError::GeoPackageUnsupported,
                callback: task_callback,
            });
        };

        if self.submitter.try_submit(task).is_err() {
            warn!(path = %path, "Task service saturated, failing layer creation");
            callback.creation_failed(self, &layer, LayerError::SchedulerSaturated);
        }

        Ok(layer)
    }
}

/// The background half of `create_from_wms`. Sends exactly one completion,
/// even when a resolution step panics.
fn resolve_wms_task(
    factory: LayerFactory,
    service_address: String,
    layer_names: String,
    layer: Arc<ImageLayer>,
    callback: Arc<dyn CreationCallback>,
) -> impl std::future::Future<Output = ()> + Send {
    async move {
        let completions = factory.completions.clone();

        let outcome =
            AssertUnwindSafe(resolve_wms_layer(&factory, &service_address, &layer_names))
                .catch_unwind()
                .await;

        let completion = match outcome {
            Ok(Ok((source, title))) => Completion::Success {
                factory,
                layer,
                source,
                title,
                callback,
            },
            Ok(Err(error)) => Completion::Failure {
                factory,
                layer,
                error,
                callback,
            },
            Err(panic) => Completion::Failure {
                factory,
                layer,
                error: LayerError::Internal(panic_message(panic)),
                callback,
            },
        };

        completions.send(completion);
    }
}

/// Fetch, parse, negotiate, construct.
async fn resolve_wms_layer(
    factory: &LayerFactory,
    service_address: &str,
    layer_names: &str,
) -> Result<(TiledImageSource, Option<String>), LayerError> {
    let url = capabilities_request_url(service_address);
    let body = factory.fetcher.fetch(&url).await?;

    let caps = WmsCapabilities::parse(&body)?;
    let negotiated = negotiate_wms_layer(&caps, layer_names)?;

    let level_set = LevelSet::from_config(&negotiated.levels)
        .map_err(|e| LayerError::Internal(e.to_string()))?;

    let source = TiledImageSource::new(WmsTileFactory::new(negotiated.config), level_set);
    Ok((source, negotiated.title))
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "resolution task panicked".to_string()
    }
}
