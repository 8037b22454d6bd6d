//! Newline-delimited JSON framing for server-streaming bodies.
//!
//! Each message is one compact JSON document followed by `\n`. A stream that
//! fails after it was accepted ends with an [`ErrorFrame`] line.

use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};

/// Content type of streaming responses.
pub const CONTENT_TYPE: &str = "application/x-ndjson";

/// Terminal line describing why a stream ended with an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub error: String,
    pub message: String,
}

impl ErrorFrame {
    pub fn from_error(err: &GateError) -> Self {
        Self {
            error: err.client_code().as_str().to_string(),
            message: err.client_message(),
        }
    }
}

/// Encode one message as a single line.
pub fn encode_line<T: Serialize>(msg: &T) -> Result<Bytes> {
    let mut buf = BytesMut::new().writer();
    serde_json::to_writer(&mut buf, msg)
        .map_err(|e| GateError::Internal(format!("ndjson encode failed: {e}")))?;
    let mut buf = buf.into_inner();
    buf.put_u8(b'\n');
    Ok(buf.freeze())
}

/// Decode one line (trailing newline optional).
pub fn decode_line<T: DeserializeOwned>(line: &[u8]) -> Result<T> {
    let trimmed = line.strip_suffix(b"\n").unwrap_or(line);
    serde_json::from_slice(trimmed)
        .map_err(|e| GateError::BadRequest(format!("invalid ndjson line: {e}")))
}

/// Incremental splitter for a chunked NDJSON body.
///
/// Chunks may cut lines anywhere; complete lines are returned as soon as their
/// terminating newline arrives.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: BytesMut,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete line it finished.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line = self.pending.split_to(pos + 1);
            if line.len() > 1 {
                lines.push(line.freeze());
            }
        }
        lines
    }

    /// Bytes received after the last newline.
    pub fn remainder(&self) -> &[u8] {
        &self.pending
    }
}
