use std::collections::BTreeMap;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use rpcgate_core::error::{GateError, Result};
use rpcgate_core::protocol::messages::Stat;

use crate::obs::GatewayMetrics;
use crate::realtime::core::registry::{FanOut, SubscriberRegistry};
use crate::realtime::types::{unix_now, TelemetryRecord};

type Record = Arc<TelemetryRecord>;

/// Per-subscriber call statistics.
///
/// Every published record is offered to every subscription's own queue; the
/// counters live inside the subscription and are only touched by the task
/// that drives it.
pub struct StatsAggregator {
    registry: Arc<SubscriberRegistry<Record>>,
    subscriber_buffer: usize,
    metrics: Arc<GatewayMetrics>,
}

impl StatsAggregator {
    pub fn new(subscriber_buffer: usize, metrics: Arc<GatewayMetrics>) -> Self {
        Self {
            registry: Arc::new(SubscriberRegistry::new()),
            subscriber_buffer: subscriber_buffer.max(1),
            metrics,
        }
    }

    pub fn publish(&self, record: &Record) -> FanOut {
        let out = self.registry.fan_out(record);
        if out.lagged > 0 {
            self.metrics
                .dropped_deliveries
                .add(&[("sink", "stats_subscriber")], out.lagged as u64);
            tracing::warn!(lagged = out.lagged, method = %record.method, "stats subscribers lagging, call not counted");
        }
        if out.removed > 0 {
            tracing::debug!(removed = out.removed, "pruned closed stats subscribers");
        }
        out
    }

    /// Start a subscription that flushes every `flush_every`.
    pub fn subscribe(&self, flush_every: Duration) -> Result<StatsSubscriber> {
        if flush_every.is_zero() {
            return Err(GateError::BadRequest("stats interval must be positive".into()));
        }
        let (tx, rx) = mpsc::channel(self.subscriber_buffer);
        let id = self
            .registry
            .add(tx)
            .ok_or_else(|| GateError::Unavailable("server is shutting down".into()))?;

        let mut ticker = interval_at(Instant::now() + flush_every, flush_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(subscriber = id, interval_ms = flush_every.as_millis() as u64, "stats subscriber added");
        Ok(StatsSubscriber {
            id,
            rx,
            ticker,
            by_method: BTreeMap::new(),
            by_consumer: BTreeMap::new(),
            registry: Arc::clone(&self.registry),
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Close every subscription and refuse new ones.
    pub fn shutdown(&self) -> usize {
        let closed = self.registry.close();
        tracing::info!(closed, "stats aggregator stopped");
        closed
    }
}

/// One stats-stream client with its own counters and flush timer.
pub struct StatsSubscriber {
    id: u64,
    rx: mpsc::Receiver<Record>,
    ticker: Interval,
    by_method: BTreeMap<String, u64>,
    by_consumer: BTreeMap<String, u64>,
    registry: Arc<SubscriberRegistry<Record>>,
}

impl StatsSubscriber {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Count records until the next tick, then return the interval's snapshot
    /// with fresh counters in place. `None` once the aggregator shut down.
    ///
    /// Cancel safe: counts survive if the future is dropped between ticks.
    pub async fn next_snapshot(&mut self) -> Option<Stat> {
        loop {
            tokio::select! {
                maybe = self.rx.recv() => match maybe {
                    Some(record) => self.count(&record),
                    None => return None,
                },
                _ = self.ticker.tick() => return Some(self.flush()),
            }
        }
    }

    fn count(&mut self, record: &TelemetryRecord) {
        *self.by_method.entry(record.method.clone()).or_insert(0) += 1;
        *self.by_consumer.entry(record.consumer.clone()).or_insert(0) += 1;
    }

    // Records already queued when the tick fires belong to this interval.
    fn flush(&mut self) -> Stat {
        while let Ok(record) = self.rx.try_recv() {
            self.count(&record);
        }
        Stat {
            timestamp: unix_now(),
            by_method: mem::take(&mut self.by_method),
            by_consumer: mem::take(&mut self.by_consumer),
        }
    }
}

impl Drop for StatsSubscriber {
    fn drop(&mut self) {
        if self.registry.remove(self.id) {
            tracing::debug!(subscriber = self.id, "stats subscriber removed");
        }
    }
}
