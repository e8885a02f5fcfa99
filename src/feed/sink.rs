//! Client sink abstraction for broadcast fan-out.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// An opaque outbound sink consuming broadcast messages.
///
/// A sink whose send fails is removed from the fan-out set and never
/// retried inline; a reconnecting client is expected to re-register.
#[async_trait]
pub trait ClientSink: Send + Sync {
    async fn send(&self, message: &Value) -> Result<()>;
}

/// Channel-backed sink; the consumer reads from the paired receiver.
pub struct ChannelSink {
    tx: mpsc::Sender<Value>,
}

/// Create a [`ChannelSink`] and the receiver draining it.
#[must_use]
pub fn channel_sink(buffer: usize) -> (ChannelSink, mpsc::Receiver<Value>) {
    let (tx, rx) = mpsc::channel(buffer);
    (ChannelSink { tx }, rx)
}

#[async_trait]
impl ClientSink for ChannelSink {
    async fn send(&self, message: &Value) -> Result<()> {
        self.tx
            .send(message.clone())
            .await
            .map_err(|_| Error::Connection("client channel closed".into()))
    }
}
