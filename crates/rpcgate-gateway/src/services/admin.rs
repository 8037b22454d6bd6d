use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use rpcgate_core::error::{GateError, Result};
use rpcgate_core::protocol::messages::{Nothing, StatInterval};

use crate::context::CallContext;
use crate::dispatch::{parse_request, MethodKind, RpcService, ServerStream};
use crate::realtime::{EventBroadcaster, StatsAggregator};

/// Monitoring streams: `Logging` (one event per observed call) and
/// `Statistics` (periodic per-method / per-consumer counters).
pub struct AdminService {
    events: Arc<EventBroadcaster>,
    stats: Arc<StatsAggregator>,
    max_interval_secs: u64,
}

impl AdminService {
    pub fn new(events: Arc<EventBroadcaster>, stats: Arc<StatsAggregator>, max_interval_secs: u64) -> Self {
        Self {
            events,
            stats,
            max_interval_secs,
        }
    }

    async fn logging(&self, ctx: CallContext, mut stream: ServerStream) -> Result<()> {
        let mut sub = self.events.subscribe()?;
        stream.accept();
        tracing::info!(consumer = %ctx.consumer(), peer = %ctx.peer(), subscriber = sub.id(), "log stream opened");

        loop {
            tokio::select! {
                record = sub.recv() => {
                    let Some(record) = record else { break; };
                    if stream.send(&record.to_event()).await.is_err() {
                        break;
                    }
                }
                _ = stream.closed() => break,
            }
        }

        tracing::info!(consumer = %ctx.consumer(), subscriber = sub.id(), "log stream closed");
        Ok(())
    }

    async fn statistics(&self, ctx: CallContext, req: StatInterval, mut stream: ServerStream) -> Result<()> {
        if req.interval_seconds == 0 || req.interval_seconds > self.max_interval_secs {
            return Err(GateError::BadRequest(format!(
                "interval_seconds must be between 1 and {}",
                self.max_interval_secs
            )));
        }

        let mut sub = self.stats.subscribe(Duration::from_secs(req.interval_seconds))?;
        stream.accept();
        tracing::info!(
            consumer = %ctx.consumer(),
            subscriber = sub.id(),
            interval_secs = req.interval_seconds,
            "stats stream opened"
        );

        loop {
            tokio::select! {
                snapshot = sub.next_snapshot() => {
                    let Some(snapshot) = snapshot else { break; };
                    if stream.send(&snapshot).await.is_err() {
                        break;
                    }
                }
                _ = stream.closed() => break,
            }
        }

        tracing::info!(consumer = %ctx.consumer(), subscriber = sub.id(), "stats stream closed");
        Ok(())
    }
}

#[async_trait]
impl RpcService for AdminService {
    fn name(&self) -> &'static str {
        "main.Admin"
    }

    fn methods(&self) -> &'static [(&'static str, MethodKind)] {
        &[
            ("Logging", MethodKind::ServerStreaming),
            ("Statistics", MethodKind::ServerStreaming),
        ]
    }

    async fn server_stream(&self, ctx: CallContext, req: Value, stream: ServerStream) -> Result<()> {
        match ctx.method().method() {
            "Logging" => {
                let _req: Nothing = parse_request(req)?;
                self.logging(ctx, stream).await
            }
            "Statistics" => {
                let req: StatInterval = parse_request(req)?;
                self.statistics(ctx, req, stream).await
            }
            other => Err(GateError::NotFound(format!("unknown admin method: {other}"))),
        }
    }
}
