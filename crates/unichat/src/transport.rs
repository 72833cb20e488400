//! WebSocket transport feeding a session.
//!
//! The transport connects once, sends the adapter's handshake, then pumps
//! text frames into the session queue and replies back to the socket. It
//! never reconnects: when the socket goes away it hands the session a
//! [`TransportFrame::Closed`] and stops.

use futures::{SinkExt, StreamExt};
use std::sync::OnceLock;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::session::{TransportFrame, TransportIo};

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// How the socket loop ended.
enum Ended {
    Cancelled,
    Closed(Option<String>),
}

#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: String,
    handshake: Vec<String>,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>, handshake: Vec<String>) -> Self {
        Self {
            url: url.into(),
            handshake,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Run the transport on its own task until `cancel` fires or the socket closes.
    pub fn spawn(self, io: TransportIo, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let TransportIo {
                frames,
                mut replies,
            } = io;

            let ended = match self.run(&frames, &mut replies, &cancel).await {
                Ok(ended) => ended,
                Err(e) => {
                    warn!(url = %self.url, error = %e, "WebSocket transport failed");
                    Ended::Closed(Some(e.to_string()))
                }
            };

            match ended {
                Ended::Cancelled => debug!(url = %self.url, "WebSocket transport cancelled"),
                Ended::Closed(reason) => {
                    info!(url = %self.url, reason = ?reason, "WebSocket transport closed");
                    // The session may already be gone.
                    let _ = frames.send(TransportFrame::Closed { reason }).await;
                }
            }
        })
    }

    async fn run(
        &self,
        frames: &tokio::sync::mpsc::Sender<TransportFrame>,
        replies: &mut tokio::sync::mpsc::UnboundedReceiver<String>,
        cancel: &CancellationToken,
    ) -> Result<Ended> {
        let url = Url::parse(&self.url)
            .map_err(|e| Error::transport(format!("invalid WebSocket url '{}': {e}", self.url)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::transport(format!(
                "unsupported WebSocket scheme '{}'",
                url.scheme()
            )));
        }

        install_rustls_provider();
        info!(url = %self.url, "Connecting to WebSocket");

        let connected = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Ok(Ended::Cancelled),
            connected = connect_async(url.as_str()) => connected,
        };
        let (mut stream, _) = connected.map_err(|e| Error::transport(format!("connect failed: {e}")))?;
        debug!(url = %self.url, "WebSocket connected");

        for message in &self.handshake {
            stream.send(Message::text(message.as_str())).await?;
        }

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    let _ = stream.close(None).await;
                    return Ok(Ended::Cancelled);
                }

                Some(reply) = replies.recv() => {
                    trace!(reply = %reply, "Sending reply");
                    stream.send(Message::text(reply)).await?;
                }

                message = stream.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            if frames.send(TransportFrame::Text(text.as_str().to_owned())).await.is_err() {
                                debug!("Session dropped its frame queue");
                                return Ok(Ended::Cancelled);
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            stream.send(Message::Pong(payload)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame.map(|f| {
                                format!("{} {}", u16::from(f.code), f.reason.as_str())
                                    .trim_end()
                                    .to_string()
                            });
                            return Ok(Ended::Closed(reason));
                        }
                        Some(Ok(other)) => {
                            trace!(len = other.len(), "Ignoring non-text WebSocket message");
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(Ended::Closed(None)),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::session_channel;

    #[tokio::test]
    async fn test_connect_failure_closes_session_queue() {
        let (transport_io, mut session_io) = session_channel(4);
        let transport = WebSocketTransport::new("ws://127.0.0.1:1", vec![]);
        transport
            .spawn(transport_io, CancellationToken::new())
            .await
            .unwrap();

        match session_io.frames.recv().await {
            Some(TransportFrame::Closed { reason: Some(reason) }) => {
                assert!(reason.contains("connect failed"), "{reason}");
            }
            other => panic!("expected a close frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejects_non_websocket_url() {
        let (transport_io, mut session_io) = session_channel(4);
        WebSocketTransport::new("https://kick.com/xqc", vec![])
            .spawn(transport_io, CancellationToken::new())
            .await
            .unwrap();

        let Some(TransportFrame::Closed { reason: Some(reason) }) = session_io.frames.recv().await
        else {
            panic!("expected a close frame");
        };
        assert!(reason.contains("unsupported WebSocket scheme 'https'"), "{reason}");
    }

    #[tokio::test]
    async fn test_cancel_before_connect_sends_nothing() {
        let (transport_io, mut session_io) = session_channel(4);
        let cancel = CancellationToken::new();
        cancel.cancel();
        WebSocketTransport::new("ws://127.0.0.1:1", vec![])
            .spawn(transport_io, cancel)
            .await
            .unwrap();

        assert!(session_io.frames.recv().await.is_none());
    }
}
