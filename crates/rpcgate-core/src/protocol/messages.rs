//! Messages exchanged by the built-in `main.Biz` and `main.Admin` services.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Empty request/response placeholder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nothing {
    #[serde(default)]
    pub dummy: bool,
}

/// One observed call attempt, as delivered on the log stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    /// Caller identity, empty when the call carried none.
    pub consumer: String,
    /// Fully-qualified method.
    pub method: String,
    /// Remote peer address.
    pub host: String,
}

/// Statistics subscription request. The zero default is rejected by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatInterval {
    pub interval_seconds: u64,
}

/// Counters accumulated over one flush interval.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    /// Seconds since the Unix epoch at flush time.
    pub timestamp: i64,
    #[serde(default)]
    pub by_method: BTreeMap<String, u64>,
    #[serde(default)]
    pub by_consumer: BTreeMap<String, u64>,
}
