//! Message-passing seam between a transport and its session.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One item a transport hands to its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFrame {
    Text(String),
    /// The transport is gone and will not come back.
    Closed { reason: Option<String> },
}

/// Something the session can close on teardown.
pub trait TransportHandle: Send + Sync {
    fn close(&self);
}

impl TransportHandle for CancellationToken {
    fn close(&self) {
        self.cancel();
    }
}

impl TransportHandle for tokio::task::AbortHandle {
    fn close(&self) {
        self.abort();
    }
}

/// Transport side of a session channel.
#[derive(Debug)]
pub struct TransportIo {
    pub frames: mpsc::Sender<TransportFrame>,
    pub replies: mpsc::UnboundedReceiver<String>,
}

/// Session side of a session channel.
#[derive(Debug)]
pub struct SessionIo {
    pub frames: mpsc::Receiver<TransportFrame>,
    pub replies: mpsc::UnboundedSender<String>,
}

/// Create the frame queue (bounded) and the reply queue (unbounded).
pub fn session_channel(frame_queue_size: usize) -> (TransportIo, SessionIo) {
    let (frames_tx, frames_rx) = mpsc::channel(frame_queue_size.max(1));
    let (replies_tx, replies_rx) = mpsc::unbounded_channel();
    (
        TransportIo {
            frames: frames_tx,
            replies: replies_rx,
        },
        SessionIo {
            frames: frames_rx,
            replies: replies_tx,
        },
    )
}
