//! Completion delivery.
//!
//! Resolution outcomes cross from background tasks to the thread that owns
//! the layers through an ordered channel. Tasks only ever send; the owning
//! thread drives the receiving end, so tile-source attachment and callbacks
//! both happen on that thread, in submission-completion order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::LayerError;
use crate::factory::{CreationCallback, LayerFactory};
use crate::layer::ImageLayer;
use crate::tile_source::TiledImageSource;

/// One resolution outcome. Each accepted creation call produces exactly
/// one of these.
pub(crate) enum Completion {
    Success {
        factory: LayerFactory,
        layer: Arc<ImageLayer>,
        source: TiledImageSource,
        title: Option<String>,
        callback: Arc<dyn CreationCallback>,
    },
    Failure {
        factory: LayerFactory,
        layer: Arc<ImageLayer>,
        error: LayerError,
        callback: Arc<dyn CreationCallback>,
    },
}

/// Create the delivery channel: a sender for the factory and the pump the
/// layer owner drives.
pub fn completion_channel() -> (CompletionSender, LayerCompletions) {
    let (sender, receiver) = mpsc::unbounded_channel();

    (
        CompletionSender { sender },
        LayerCompletions {
            receiver,
            on_redraw: None,
        },
    )
}

/// Sending half of the completion channel, held by factories.
#[derive(Clone)]
pub struct CompletionSender {
    sender: mpsc::UnboundedSender<Completion>,
}

impl CompletionSender {
    pub(crate) fn send(&self, completion: Completion) {
        if self.sender.send(completion).is_err() {
            warn!("Layer completion dropped, receiver is gone");
        }
    }
}

/// Receiving half of the completion channel.
///
/// Whatever thread drives this pump is the thread on which layers mutate
/// and callbacks fire.
pub struct LayerCompletions {
    receiver: mpsc::UnboundedReceiver<Completion>,
    on_redraw: Option<Box<dyn Fn() + Send>>,
}

impl LayerCompletions {
    /// Install a hook invoked after each successfully delivered layer,
    /// typically a scene redraw request.
    pub fn set_redraw_hook(&mut self, hook: impl Fn() + Send + 'static) {
        self.on_redraw = Some(Box::new(hook));
    }

    /// Deliver every queued completion without blocking. Returns the number
    /// delivered.
    pub fn run_pending(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(completion) = self.receiver.try_recv() {
            self.deliver(completion);
            delivered += 1;
        }
        delivered
    }

    /// Await the next completion and deliver it. Returns `false` once every
    /// sender is gone and the queue is drained.
    pub async fn deliver_next(&mut self) -> bool {
        match self.receiver.recv().await {
            Some(completion) => {
                self.deliver(completion);
                true
            }
            None => false,
        }
    }

    fn deliver(&self, completion: Completion) {
        match completion {
            Completion::Success {
                factory,
                layer,
                source,
                title,
                callback,
            } => {
                // Mutate the layer before the callback so the callback
                // observes a populated layer.
                if let Some(title) = title {
                    layer.set_display_name(title);
                }
                layer.attach_source(source);
                debug!(layer = %layer.name(), "Layer resolved");
                callback.creation_succeeded(&factory, &layer);
                if let Some(hook) = &self.on_redraw {
                    hook();
                }
            }
            Completion::Failure {
                factory,
                layer,
                error,
                callback,
            } => {
                warn!(layer = %layer.name(), error = %error, "Layer resolution failed");
                callback.creation_failed(&factory, &layer, error);
            }
        }
    }
}
