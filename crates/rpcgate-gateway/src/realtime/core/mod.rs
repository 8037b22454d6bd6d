//! Realtime core components.
//!
//! Subscriber registry, log fan-out, per-subscriber statistics and the tap
//! that feeds them.

mod broadcaster;
mod observer;
mod registry;
mod stats;

pub use broadcaster::{EventBroadcaster, LogSubscriber};
pub use observer::{CallObserver, UNREGISTERED_METHOD};
pub use registry::{FanOut, SubscriberRegistry};
pub use stats::{StatsAggregator, StatsSubscriber};
