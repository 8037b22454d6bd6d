#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use rpcgate_core::protocol::method::MethodName;
use rpcgate_gateway::context::CallContext;
use rpcgate_gateway::dispatch::{Dispatcher, InterceptorChain};
use rpcgate_gateway::obs::GatewayMetrics;
use rpcgate_gateway::realtime::{
    CallObserver, EventBroadcaster, FanOut, StatsAggregator, SubscriberRegistry, TelemetryRecord,
    UNREGISTERED_METHOD,
};
use rpcgate_gateway::services::BizService;

fn record(consumer: &str, method: &str) -> Arc<TelemetryRecord> {
    Arc::new(TelemetryRecord {
        timestamp: 1,
        consumer: consumer.into(),
        method: method.into(),
        peer: "127.0.0.1:9000".into(),
    })
}

#[test]
fn registry_prunes_closed_and_skips_full() {
    let reg: SubscriberRegistry<u32> = SubscriberRegistry::new();
    let (tx_ok, mut rx_ok) = mpsc::channel(4);
    let (tx_full, mut rx_full) = mpsc::channel(1);
    let (tx_gone, rx_gone) = mpsc::channel(4);
    reg.add(tx_ok).unwrap();
    reg.add(tx_full).unwrap();
    reg.add(tx_gone).unwrap();
    drop(rx_gone);

    let first = reg.fan_out(&1);
    assert_eq!(first, FanOut { delivered: 2, lagged: 0, removed: 1 });
    assert_eq!(reg.len(), 2);

    // the 1-slot queue is still holding the first item
    let second = reg.fan_out(&2);
    assert_eq!(second, FanOut { delivered: 1, lagged: 1, removed: 0 });

    assert_eq!(rx_ok.try_recv().unwrap(), 1);
    assert_eq!(rx_ok.try_recv().unwrap(), 2);
    assert_eq!(rx_full.try_recv().unwrap(), 1);
    assert!(rx_full.try_recv().is_err());
}

#[test]
fn closed_registry_refuses_and_ends_receivers() {
    let reg: SubscriberRegistry<u32> = SubscriberRegistry::new();
    let (tx, mut rx) = mpsc::channel(4);
    let id = reg.add(tx).unwrap();
    assert!(reg.is_open());

    assert_eq!(reg.close(), 1);
    assert!(!reg.is_open());
    assert!(reg.is_empty());
    assert!(!reg.remove(id));
    assert!(rx.try_recv().is_err());

    let (tx2, _rx2) = mpsc::channel(4);
    assert!(reg.add(tx2).is_none());
}

#[tokio::test]
async fn log_subscribers_see_same_records_in_order() {
    let metrics = Arc::new(GatewayMetrics::default());
    let events = EventBroadcaster::spawn(64, 16, metrics);
    let mut a = events.subscribe().unwrap();
    let mut b = events.subscribe().unwrap();
    assert_ne!(a.id(), b.id());
    assert_eq!(events.subscriber_count(), 2);

    for m in ["/main.Biz/Check", "/main.Biz/Add", "/main.Biz/Test"] {
        assert!(events.publish(record("biz_admin", m)));
    }

    for sub in [&mut a, &mut b] {
        let mut got = Vec::new();
        for _ in 0..3 {
            got.push(sub.recv().await.unwrap().method.clone());
        }
        assert_eq!(got, ["/main.Biz/Check", "/main.Biz/Add", "/main.Biz/Test"]);
    }
}

#[tokio::test]
async fn dropped_log_subscriber_deregisters() {
    let events = EventBroadcaster::spawn(64, 16, Arc::new(GatewayMetrics::default()));
    let a = events.subscribe().unwrap();
    let _b = events.subscribe().unwrap();
    drop(a);
    assert_eq!(events.subscriber_count(), 1);
}

#[tokio::test]
async fn broadcaster_shutdown_ends_streams() {
    let events = EventBroadcaster::spawn(64, 16, Arc::new(GatewayMetrics::default()));
    let mut sub = events.subscribe().unwrap();

    events.shutdown().await;
    assert!(sub.recv().await.is_none());

    let err = events.subscribe().err().expect("closed broadcaster must refuse");
    assert_eq!(err.client_code().as_str(), "UNAVAILABLE");

    // second shutdown is a no-op
    events.shutdown().await;
}

#[tokio::test]
async fn slow_log_subscriber_only_loses_its_own_records() {
    let metrics = Arc::new(GatewayMetrics::default());
    let events = EventBroadcaster::spawn(64, 1, Arc::clone(&metrics));
    let mut slow = events.subscribe().unwrap();

    events.publish(record("a", "/Svc/One"));
    events.publish(record("a", "/Svc/Two"));

    // wait for the worker to hit the full queue
    tokio::time::timeout(Duration::from_secs(5), async {
        while metrics.dropped_deliveries.get(&[("sink", "log_subscriber")]) == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("second record must be dropped for the slow subscriber");

    assert_eq!(slow.recv().await.unwrap().method, "/Svc/One");
    events.shutdown().await;
    assert!(slow.recv().await.is_none());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn stats_snapshot_counts_then_resets() {
    let stats = StatsAggregator::new(64, Arc::new(GatewayMetrics::default()));
    let mut sub = stats.subscribe(Duration::from_secs(1)).unwrap();

    for _ in 0..5 {
        stats.publish(&record("biz_user", "methodX"));
    }

    let snap = sub.next_snapshot().await.unwrap();
    assert_eq!(snap.by_method.get("methodX"), Some(&5));
    assert_eq!(snap.by_consumer.get("biz_user"), Some(&5));

    let empty = sub.next_snapshot().await.unwrap();
    assert_eq!(empty.by_method.get("methodX").copied().unwrap_or(0), 0);
    assert!(empty.by_consumer.is_empty());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn stats_subscribers_count_independently() {
    let stats = StatsAggregator::new(64, Arc::new(GatewayMetrics::default()));
    let mut early = stats.subscribe(Duration::from_secs(2)).unwrap();

    stats.publish(&record("a", "/Svc/M"));
    let mut late = stats.subscribe(Duration::from_secs(2)).unwrap();
    stats.publish(&record("b", "/Svc/M"));

    let (e, l) = tokio::join!(early.next_snapshot(), late.next_snapshot());
    let (e, l) = (e.unwrap(), l.unwrap());
    assert_eq!(e.by_method["/Svc/M"], 2);
    assert_eq!(l.by_method["/Svc/M"], 1);
    assert!(!l.by_consumer.contains_key("a"));
}

#[tokio::test]
async fn stats_rejects_zero_interval_and_closes_on_shutdown() {
    let stats = StatsAggregator::new(8, Arc::new(GatewayMetrics::default()));
    let err = stats.subscribe(Duration::ZERO).err().expect("zero interval");
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");

    let mut sub = stats.subscribe(Duration::from_secs(60)).unwrap();
    assert_eq!(stats.subscriber_count(), 1);
    assert_eq!(stats.shutdown(), 1);
    assert!(sub.next_snapshot().await.is_none());

    let err = stats.subscribe(Duration::from_secs(1)).err().expect("closed");
    assert_eq!(err.client_code().as_str(), "UNAVAILABLE");
}

#[tokio::test]
async fn observer_feeds_both_sinks_once_per_call() {
    let metrics = Arc::new(GatewayMetrics::default());
    let events = Arc::new(EventBroadcaster::spawn(64, 16, Arc::clone(&metrics)));
    let stats = Arc::new(StatsAggregator::new(16, Arc::clone(&metrics)));
    let dispatcher = Arc::new(Dispatcher::new());
    dispatcher.register(Arc::new(BizService::new()));
    let chain = InterceptorChain::new().with_tap(Arc::new(CallObserver::new(
        Arc::clone(&events),
        Arc::clone(&stats),
        dispatcher,
        Arc::clone(&metrics),
    )));

    let mut log = events.subscribe().unwrap();
    let mut counts = stats.subscribe(Duration::from_millis(50)).unwrap();

    let ctx = CallContext::new(MethodName::parse("/main.Biz/Check").unwrap(), "", "10.0.0.1:4000");
    chain.observe(&ctx);

    let rec = log.recv().await.unwrap();
    assert_eq!(rec.consumer, "");
    assert_eq!(rec.method, "/main.Biz/Check");
    assert_eq!(rec.to_event().host, "10.0.0.1:4000");

    let snap = counts.next_snapshot().await.unwrap();
    assert_eq!(snap.by_method["/main.Biz/Check"], 1);
    assert_eq!(snap.by_consumer[""], 1);
    assert_eq!(metrics.calls_observed.get(&[("method", "/main.Biz/Check")]), 1);

    // unknown methods still reach the sinks but share one counter series
    let ctx = CallContext::new(MethodName::parse("/junk/m1").unwrap(), "", "10.0.0.1:4000");
    chain.observe(&ctx);
    assert_eq!(log.recv().await.unwrap().method, "/junk/m1");
    assert_eq!(metrics.calls_observed.get(&[("method", "/junk/m1")]), 0);
    assert_eq!(metrics.calls_observed.get(&[("method", UNREGISTERED_METHOD)]), 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn records_queued_before_tick_land_in_that_snapshot() {
    let stats = StatsAggregator::new(64, Arc::new(GatewayMetrics::default()));

    for round in 0..20 {
        let mut sub = stats.subscribe(Duration::from_secs(1)).unwrap();
        tokio::time::advance(Duration::from_millis(500)).await;
        for _ in 0..5 {
            stats.publish(&record("c", "X"));
        }
        // tick and queued records are both ready at the next poll
        tokio::time::advance(Duration::from_millis(600)).await;

        let snap = sub.next_snapshot().await.unwrap();
        assert_eq!(snap.by_method.get("X"), Some(&5), "round {round}");
    }
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn dropped_stats_subscriber_leaves_without_stalling_others() {
    let stats = StatsAggregator::new(4, Arc::new(GatewayMetrics::default()));
    let gone = stats.subscribe(Duration::from_secs(1)).unwrap();
    let mut kept = stats.subscribe(Duration::from_secs(1)).unwrap();
    assert_eq!(stats.subscriber_count(), 2);

    drop(gone);
    assert_eq!(stats.subscriber_count(), 1);

    // more records than one queue holds: nothing is removed and `kept` is not blocked
    let out = stats.publish(&record("a", "/Svc/M"));
    assert_eq!(out, FanOut { delivered: 1, lagged: 0, removed: 0 });
    for _ in 0..3 {
        stats.publish(&record("a", "/Svc/M"));
    }

    let snap = kept.next_snapshot().await.unwrap();
    assert_eq!(snap.by_method["/Svc/M"], 4);

    drop(kept);
    assert_eq!(stats.subscriber_count(), 0);
    assert_eq!(stats.publish(&record("a", "/Svc/M")), FanOut::default());
}
