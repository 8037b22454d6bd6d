use std::time::{SystemTime, UNIX_EPOCH};

use rpcgate_core::protocol::messages::Event;

use crate::context::CallContext;

/// One observed call attempt. Built once by the tap, shared read-only by
/// every sink it is delivered to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryRecord {
    pub timestamp: i64,
    pub consumer: String,
    pub method: String,
    pub peer: String,
}

impl TelemetryRecord {
    pub fn from_call(ctx: &CallContext) -> Self {
        Self {
            timestamp: unix_now(),
            consumer: ctx.consumer().to_string(),
            method: ctx.method().as_str().to_string(),
            peer: ctx.peer().to_string(),
        }
    }

    /// Wire form delivered on the log stream.
    pub fn to_event(&self) -> Event {
        Event {
            timestamp: self.timestamp,
            consumer: self.consumer.clone(),
            method: self.method.clone(),
            host: self.peer.clone(),
        }
    }
}

/// Seconds since the Unix epoch (0 if the clock is before it).
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
