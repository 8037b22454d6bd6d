//! Outbound half of a server-streaming call.

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use rpcgate_core::error::{GateError, Result};
use rpcgate_core::protocol::ndjson;

/// Sink for the messages of one server-streaming call.
///
/// The transport answers with response headers only once the handler calls
/// [`ServerStream::accept`] (or sends its first message). A handler that
/// returns an error before that point produces a plain error response.
pub struct ServerStream {
    tx: mpsc::Sender<Bytes>,
    accepted: Option<oneshot::Sender<()>>,
}

impl ServerStream {
    pub fn new(tx: mpsc::Sender<Bytes>, accepted: oneshot::Sender<()>) -> Self {
        Self {
            tx,
            accepted: Some(accepted),
        }
    }

    /// Commit to streaming. Idempotent.
    pub fn accept(&mut self) {
        if let Some(a) = self.accepted.take() {
            let _ = a.send(());
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted.is_none()
    }

    /// Send one message, waiting for room in the outbound buffer.
    /// Fails with `UNAVAILABLE` once the peer has gone away.
    pub async fn send<T: Serialize>(&mut self, msg: &T) -> Result<()> {
        self.accept();
        let line = ndjson::encode_line(msg)?;
        self.tx
            .send(line)
            .await
            .map_err(|_| GateError::Unavailable("stream closed by peer".into()))
    }

    /// Resolves when the peer stops reading.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
