//! Realtime telemetry (egress engine) for the gateway.
//!
//! The call observer turns each inbound call into a `TelemetryRecord`; the
//! event broadcaster fans records out to log streams and the stats aggregator
//! feeds per-subscriber counters.

pub mod core;
pub mod types;

pub use core::{
    CallObserver, EventBroadcaster, FanOut, LogSubscriber, StatsAggregator, StatsSubscriber,
    SubscriberRegistry, UNREGISTERED_METHOD,
};
pub use types::{unix_now, TelemetryRecord};
