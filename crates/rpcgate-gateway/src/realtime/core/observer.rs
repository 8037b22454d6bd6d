use std::sync::Arc;

use crate::context::CallContext;
use crate::dispatch::{CallTap, Dispatcher};
use crate::obs::GatewayMetrics;
use crate::realtime::core::{EventBroadcaster, StatsAggregator};
use crate::realtime::types::TelemetryRecord;

/// Metric label shared by every method the dispatcher does not know.
pub const UNREGISTERED_METHOD: &str = "unregistered";

/// Pre-authorization tap: records every call attempt, allowed or not.
///
/// Only non-blocking sends happen on the call path; fan-out to log streams
/// runs on the broadcaster's worker. The `calls_observed` counter is labelled
/// by registered methods only, so arbitrary paths cannot grow it.
pub struct CallObserver {
    events: Arc<EventBroadcaster>,
    stats: Arc<StatsAggregator>,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<GatewayMetrics>,
}

impl CallObserver {
    pub fn new(
        events: Arc<EventBroadcaster>,
        stats: Arc<StatsAggregator>,
        dispatcher: Arc<Dispatcher>,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            events,
            stats,
            dispatcher,
            metrics,
        }
    }
}

impl CallTap for CallObserver {
    fn on_call(&self, ctx: &CallContext) {
        let record = Arc::new(TelemetryRecord::from_call(ctx));
        let label = if self.dispatcher.contains(ctx.method().as_str()) {
            ctx.method().as_str()
        } else {
            UNREGISTERED_METHOD
        };
        self.metrics.calls_observed.inc(&[("method", label)]);
        tracing::trace!(consumer = %record.consumer, method = %record.method, peer = %record.peer, "call observed");

        self.stats.publish(&record);
        self.events.publish(record);
    }
}
