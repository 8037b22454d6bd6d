//! Shared application state for the gateway.
//!
//! Built once per runtime start: compiled policy, interceptor chain, service
//! registry and the telemetry sinks. Cloned cheaply into every handler.

use std::sync::Arc;

use rpcgate_core::error::Result;

use crate::config::GatewayConfig;
use crate::dispatch::{Dispatcher, InterceptorChain};
use crate::obs::GatewayMetrics;
use crate::policy::{AccessInterceptor, AccessPolicy};
use crate::realtime::{CallObserver, EventBroadcaster, StatsAggregator};
use crate::services::{AdminService, BizService};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    policy: Arc<AccessPolicy>,
    chain: Arc<InterceptorChain>,
    dispatcher: Arc<Dispatcher>,
    events: Arc<EventBroadcaster>,
    stats: Arc<StatsAggregator>,
    metrics: Arc<GatewayMetrics>,
}

impl AppState {
    /// Compile the policy and wire the gateway.
    ///
    /// Starts the event dispatch worker, so it must run inside a Tokio runtime.
    /// Returns Result so startup can report a bad policy instead of panicking.
    pub fn new(cfg: GatewayConfig) -> Result<Self> {
        // 1) Compile access policy
        let policy = Arc::new(AccessPolicy::new(&cfg.acl)?);

        // 2) Telemetry sinks
        let metrics = Arc::new(GatewayMetrics::default());
        let events = Arc::new(EventBroadcaster::spawn(
            cfg.server.event_buffer,
            cfg.server.subscriber_buffer,
            Arc::clone(&metrics),
        ));
        let stats = Arc::new(StatsAggregator::new(cfg.server.subscriber_buffer, Arc::clone(&metrics)));

        // 3) Services
        let dispatcher = Arc::new(Dispatcher::new());
        dispatcher.register(Arc::new(BizService::new()));
        dispatcher.register(Arc::new(AdminService::new(
            Arc::clone(&events),
            Arc::clone(&stats),
            cfg.server.max_stats_interval_secs,
        )));

        // 4) Interceptor chain: tap first, then access checks
        let observer = Arc::new(CallObserver::new(
            Arc::clone(&events),
            Arc::clone(&stats),
            Arc::clone(&dispatcher),
            Arc::clone(&metrics),
        ));
        let access = Arc::new(AccessInterceptor::new(Arc::clone(&policy), Arc::clone(&metrics)));
        let chain = InterceptorChain::new()
            .with_tap(observer)
            .with_unary(access.clone())
            .with_stream(access);

        // policy <-> dispatcher sanity check
        let methods = dispatcher.registered_methods();
        for consumer in policy.consumers() {
            for pattern in policy.patterns(consumer) {
                if !methods.iter().any(|m| pattern.matches(m)) {
                    tracing::warn!(consumer = %consumer, pattern = %pattern.as_str(), "acl pattern matches no registered method");
                }
            }
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                policy,
                chain: Arc::new(chain),
                dispatcher,
                events,
                stats,
                metrics,
            }),
        })
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn policy(&self) -> Arc<AccessPolicy> {
        Arc::clone(&self.inner.policy)
    }

    pub fn chain(&self) -> Arc<InterceptorChain> {
        Arc::clone(&self.inner.chain)
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.inner.dispatcher)
    }

    pub fn events(&self) -> Arc<EventBroadcaster> {
        Arc::clone(&self.inner.events)
    }

    pub fn stats(&self) -> Arc<StatsAggregator> {
        Arc::clone(&self.inner.stats)
    }

    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    pub fn is_draining(&self) -> bool {
        self.inner.metrics.is_draining()
    }

    /// Live gauges rendered alongside the counters.
    pub fn metrics_extra(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("rpcgate_log_subscribers", self.inner.events.subscriber_count() as u64),
            ("rpcgate_stats_subscribers", self.inner.stats.subscriber_count() as u64),
        ]
    }

    /// Enter draining: refuse new calls and close every subscription.
    pub async fn drain(&self) {
        self.inner.metrics.set_draining();
        self.inner.events.shutdown().await;
        self.inner.stats.shutdown();
    }
}
