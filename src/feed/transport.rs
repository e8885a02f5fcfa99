//! Source transport abstraction and the WebSocket implementation.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::{Error, Result};

/// Raw message transport for one external data source.
///
/// Implementations handle the wire protocol; the connection loop owns
/// retries, backoff and message routing. The seam exists so the loop can
/// be driven by scripted transports in tests.
#[async_trait]
pub trait SourceTransport: Send {
    /// Open the underlying connection.
    async fn connect(&mut self) -> Result<()>;

    /// Send a text frame.
    async fn send(&mut self, text: String) -> Result<()>;

    /// Receive the next text message.
    ///
    /// Returns `None` when the stream is closed, `Some(Err(_))` on a
    /// transport failure.
    async fn next_message(&mut self) -> Option<Result<String>>;

    /// Close the connection, releasing the transport cleanly.
    async fn close(&mut self);
}

/// Factory producing a fresh transport per connection attempt.
pub type TransportFactory = Box<dyn Fn() -> Box<dyn SourceTransport> + Send + Sync>;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport over tokio-tungstenite.
pub struct WsTransport {
    url: Url,
    stream: Option<WsStream>,
}

impl WsTransport {
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self { url, stream: None }
    }

    /// Factory for reconnect loops: builds a disconnected transport for
    /// the given endpoint on every call.
    #[must_use]
    pub fn factory(url: Url) -> TransportFactory {
        Box::new(move || Box::new(Self::new(url.clone())))
    }
}

#[async_trait]
impl SourceTransport for WsTransport {
    async fn connect(&mut self) -> Result<()> {
        let (stream, _response) = connect_async(self.url.as_str()).await?;
        self.stream = Some(stream);
        Ok(())
    }

    async fn send(&mut self, text: String) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::Connection("not connected".into()))?;
        stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn next_message(&mut self) -> Option<Result<String>> {
        let stream = self.stream.as_mut()?;

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text)),
                // Control frames are handled by the library; skip them.
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Binary(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Err(e)) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.close(None).await;
        }
    }
}
