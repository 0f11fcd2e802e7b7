//! Asynchronous WMS layer resolution.
//!
//! [`LayerFactory`] turns a service address and a layer name into a
//! displayable [`ImageLayer`] without blocking the caller: the layer is
//! returned immediately as an empty placeholder, capabilities retrieval
//! and negotiation run on a bounded [`TaskService`], and the outcome is
//! delivered back on the thread driving [`LayerCompletions`].
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use globe_layers::{
//!     completion_channel, CreationCallback, ImageLayer, LayerError, LayerFactory,
//!     TaskService, TaskServiceConfig,
//! };
//!
//! struct LogOutcome;
//!
//! impl CreationCallback for LogOutcome {
//!     fn creation_succeeded(&self, _factory: &LayerFactory, layer: &Arc<ImageLayer>) {
//!         println!("{} resolved", layer.name());
//!     }
//!
//!     fn creation_failed(&self, _factory: &LayerFactory, layer: &Arc<ImageLayer>, error: LayerError) {
//!         eprintln!("{} failed: {error}", layer.name());
//!     }
//! }
//!
//! # async fn example() -> Result<(), LayerError> {
//! let (service, submitter) = TaskService::new(&TaskServiceConfig::default());
//! tokio::spawn(service.run());
//! let (sender, mut completions) = completion_channel();
//!
//! let factory = LayerFactory::new(submitter, sender);
//! let layer = factory.create_from_wms(
//!     "https://wms.example.com/wms",
//!     "bluemarble",
//!     Arc::new(LogOutcome),
//! )?;
//!
//! completions.deliver_next().await;
//! println!("resolved: {}", layer.is_resolved());
//! # Ok(())
//! # }
//! ```

pub mod completion;
pub mod config;
pub mod error;
pub mod factory;
pub mod fetch;
pub mod layer;
pub mod negotiate;
pub mod tasks;
pub mod tile_source;
pub mod wms_tile;

pub use completion::{completion_channel, CompletionSender, LayerCompletions};
pub use config::{ResolutionConfig, TaskServiceConfig};
pub use error::LayerError;
pub use factory::{CreationCallback, LayerFactory};
pub use fetch::{CapabilitiesFetcher, FetchError, HttpFetcher};
pub use layer::ImageLayer;
pub use negotiate::{negotiate_wms_layer, NegotiatedLayer};
pub use tasks::{TaskRejected, TaskService, TaskSubmitter};
pub use tile_source::{TileUrlFactory, TiledImageSource};
pub use wms_tile::{capabilities_request_url, WmsLayerConfig, WmsTileFactory};
