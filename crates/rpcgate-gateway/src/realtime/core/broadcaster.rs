use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use rpcgate_core::error::{GateError, Result};

use crate::obs::GatewayMetrics;
use crate::realtime::core::registry::SubscriberRegistry;
use crate::realtime::types::TelemetryRecord;

type Record = Arc<TelemetryRecord>;

/// Log-stream fan-out: one intake queue, one dispatch worker, N subscribers.
///
/// A single worker drains the intake, so every subscriber sees records in the
/// order they were published.
pub struct EventBroadcaster {
    intake: mpsc::Sender<Record>,
    registry: Arc<SubscriberRegistry<Record>>,
    subscriber_buffer: usize,
    stop: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    metrics: Arc<GatewayMetrics>,
}

impl EventBroadcaster {
    /// Create the broadcaster and start its dispatch worker on the current runtime.
    pub fn spawn(intake_capacity: usize, subscriber_buffer: usize, metrics: Arc<GatewayMetrics>) -> Self {
        let (intake, rx) = mpsc::channel(intake_capacity.max(1));
        let (stop, stop_rx) = watch::channel(false);
        let registry = Arc::new(SubscriberRegistry::new());

        let worker = tokio::spawn(dispatch_loop(
            rx,
            stop_rx,
            Arc::clone(&registry),
            Arc::clone(&metrics),
        ));

        Self {
            intake,
            registry,
            subscriber_buffer: subscriber_buffer.max(1),
            stop,
            worker: Mutex::new(Some(worker)),
            metrics,
        }
    }

    /// Queue a record for fan-out without waiting. Returns false if it was dropped.
    pub fn publish(&self, record: Record) -> bool {
        match self.intake.try_send(record) {
            Ok(()) => true,
            Err(TrySendError::Full(r)) => {
                self.metrics.dropped_deliveries.inc(&[("sink", "event_intake")]);
                tracing::warn!(method = %r.method, "event intake full, record dropped");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Register a new log subscriber. Fails with `UNAVAILABLE` while draining.
    pub fn subscribe(&self) -> Result<LogSubscriber> {
        let (tx, rx) = mpsc::channel(self.subscriber_buffer);
        let id = self
            .registry
            .add(tx)
            .ok_or_else(|| GateError::Unavailable("server is shutting down".into()))?;
        tracing::debug!(subscriber = id, total = self.registry.len(), "log subscriber added");
        Ok(LogSubscriber {
            id,
            rx,
            registry: Arc::clone(&self.registry),
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Stop the worker and close every subscriber. Idempotent.
    pub async fn shutdown(&self) {
        let _ = self.stop.send(true);
        let closed = self.registry.close();
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "event dispatch worker failed");
            }
            tracing::info!(closed, "event broadcaster stopped");
        }
    }
}

async fn dispatch_loop(
    mut intake: mpsc::Receiver<Record>,
    mut stop: watch::Receiver<bool>,
    registry: Arc<SubscriberRegistry<Record>>,
    metrics: Arc<GatewayMetrics>,
) {
    loop {
        tokio::select! {
            biased;

            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }

            maybe = intake.recv() => {
                let Some(record) = maybe else { break; };
                let out = registry.fan_out(&record);
                if out.lagged > 0 {
                    metrics
                        .dropped_deliveries
                        .add(&[("sink", "log_subscriber")], out.lagged as u64);
                    tracing::warn!(lagged = out.lagged, "log subscribers lagging, record dropped for them");
                }
                if out.removed > 0 {
                    tracing::debug!(removed = out.removed, "pruned closed log subscribers");
                }
            }
        }
    }
}

/// One connected log-stream client.
///
/// Receives records in publication order until the client goes away or the
/// broadcaster shuts down. Dropping it deregisters it.
pub struct LogSubscriber {
    id: u64,
    rx: mpsc::Receiver<Record>,
    registry: Arc<SubscriberRegistry<Record>>,
}

impl LogSubscriber {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next record; `None` once the broadcaster has shut down.
    pub async fn recv(&mut self) -> Option<Record> {
        self.rx.recv().await
    }
}

impl Drop for LogSubscriber {
    fn drop(&mut self) {
        if self.registry.remove(self.id) {
            tracing::debug!(subscriber = self.id, "log subscriber removed");
        }
    }
}
