#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::HashMap;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use futures_util::StreamExt;
use serde_json::Value;
use tower::ServiceExt;

use rpcgate_core::protocol::messages::Event;
use rpcgate_core::protocol::ndjson::{self, LineBuffer};
use rpcgate_gateway::{
    app_state::AppState,
    config::{GatewayConfig, ServerSection},
    router::build_router,
};

fn state() -> AppState {
    let acl: HashMap<String, Vec<String>> = serde_json::from_str(
        r#"{
            "logger": ["/main.Admin/Logging"],
            "stat": ["/main.Admin/Statistics"],
            "biz_user": ["/main.Biz/Check", "/main.Biz/Add"],
            "biz_admin": ["/main.Biz/*"]
        }"#,
    )
    .unwrap();
    AppState::new(GatewayConfig {
        version: 1,
        server: ServerSection::default(),
        acl,
    })
    .unwrap()
}

fn rpc(path: &str, consumer: Option<&str>, body: &str) -> Request<Body> {
    let mut b = Request::post(path).header(header::CONTENT_TYPE, "application/json");
    if let Some(c) = consumer {
        b = b.header("consumer", c);
    }
    b.body(Body::from(body.to_string())).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.unwrap()
}

async fn json_body(resp: Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn allowed_unary_call_returns_response() {
    let app = build_router(state());

    let resp = send(&app, rpc("/main.Biz/Check", Some("biz_user"), "{}")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, serde_json::json!({ "dummy": false }));

    // empty body is the default request
    let resp = send(&app, rpc("/main.Biz/Add", Some("biz_user"), "")).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn denials_are_split_by_identity() {
    let app = build_router(state());

    let resp = send(&app, rpc("/main.Biz/Test", Some("biz_user"), "{}")).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(resp).await["error"], "PERMISSION_DENIED");

    let resp = send(&app, rpc("/main.Biz/Check", None, "{}")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["error"], "UNAUTHENTICATED");

    let resp = send(&app, rpc("/main.Biz/Check", Some("mallory"), "{}")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_method_is_hidden_from_unauthorized_callers() {
    let app = build_router(state());

    let resp = send(&app, rpc("/main.Biz/Drop", Some("biz_user"), "{}")).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = send(&app, rpc("/main.Biz/Drop", Some("biz_admin"), "{}")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(resp).await["error"], "NOT_FOUND");
}

#[tokio::test]
async fn every_attempt_is_observed_even_when_refused() {
    let st = state();
    let app = build_router(st.clone());

    send(&app, rpc("/main.Biz/Check", Some("biz_user"), "{}")).await;
    send(&app, rpc("/main.Biz/Check", None, "{}")).await;
    let resp = send(&app, rpc("/main.Biz/Check", Some("biz_user"), "{not json")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let m = st.metrics();
    assert_eq!(m.calls_observed.get(&[("method", "/main.Biz/Check")]), 3);
    assert_eq!(m.policy_decisions.get(&[("decision", "allow")]), 1);
    assert_eq!(m.call_errors.get(&[("code", "UNAUTHENTICATED")]), 1);
    assert_eq!(m.call_errors.get(&[("code", "BAD_REQUEST")]), 1);
}

#[tokio::test]
async fn streaming_denial_is_a_plain_error() {
    let app = build_router(state());

    let resp = send(&app, rpc("/main.Admin/Logging", Some("biz_admin"), "{}")).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(resp).await["error"], "PERMISSION_DENIED");

    let resp = send(&app, rpc("/main.Admin/Statistics", Some("stat"), r#"{"interval_seconds": 0}"#)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn log_stream_delivers_later_calls() {
    let st = state();
    let app = build_router(st.clone());

    let resp = send(&app, rpc("/main.Admin/Logging", Some("logger"), "{}")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], ndjson::CONTENT_TYPE);
    assert_eq!(st.events().subscriber_count(), 1);

    send(&app, rpc("/main.Biz/Check", Some("biz_user"), "{}")).await;

    let mut body = resp.into_body().into_data_stream();
    let mut lines = LineBuffer::new();
    // the subscription call itself may show up first
    let event = 'outer: loop {
        let chunk = body.next().await.expect("stream open").unwrap();
        for line in lines.push(&chunk) {
            let ev: Event = ndjson::decode_line(&line).unwrap();
            if ev.method != "/main.Admin/Logging" {
                break 'outer ev;
            }
        }
    };
    assert_eq!(event.consumer, "biz_user");
    assert_eq!(event.method, "/main.Biz/Check");
    assert_eq!(event.host, "unknown");

    // draining closes the subscription, which ends the body
    st.drain().await;
    while let Some(chunk) = body.next().await {
        chunk.unwrap();
    }
}

#[tokio::test]
async fn ops_endpoints_follow_drain_state() {
    let st = state();
    let app = build_router(st.clone());

    let resp = send(&app, Request::get("/healthz").body(Body::empty()).unwrap()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = send(&app, Request::get("/readyz").body(Body::empty()).unwrap()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    send(&app, rpc("/main.Biz/Check", Some("biz_user"), "{}")).await;
    let resp = send(&app, Request::get("/metrics").body(Body::empty()).unwrap()).await;
    let text = String::from_utf8(to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec()).unwrap();
    assert!(text.contains("rpcgate_calls_observed_total{method=\"/main.Biz/Check\"} 1"));
    assert!(text.contains("rpcgate_log_subscribers 0"));
    assert!(text.contains("rpcgate_draining 0"));

    st.drain().await;

    let resp = send(&app, Request::get("/readyz").body(Body::empty()).unwrap()).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let resp = send(&app, rpc("/main.Biz/Check", Some("biz_user"), "{}")).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let resp = send(&app, rpc("/main.Admin/Logging", Some("logger"), "{}")).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn observed_series_stay_bounded_for_unknown_paths() {
    let st = state();
    let app = build_router(st.clone());

    for i in 0..500 {
        let resp = send(&app, rpc(&format!("/junk{i}/m{i}"), None, "")).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
    send(&app, rpc("/main.Biz/Check", Some("biz_user"), "{}")).await;

    let resp = send(&app, Request::get("/metrics").body(Body::empty()).unwrap()).await;
    let text = String::from_utf8(to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec()).unwrap();
    let series = text
        .lines()
        .filter(|l| l.starts_with("rpcgate_calls_observed_total{"))
        .count();
    assert_eq!(series, 2);

    let m = st.metrics();
    assert_eq!(m.calls_observed.get(&[("method", "unregistered")]), 500);
    assert_eq!(m.calls_observed.get(&[("method", "/main.Biz/Check")]), 1);
}

#[tokio::test]
async fn escaped_slash_is_observed_and_routed_as_unknown() {
    let st = state();
    let app = build_router(st.clone());

    let resp = send(&app, rpc("/main.Biz/a%2Fb", Some("biz_admin"), "{}")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = send(&app, rpc("/main.Biz/a%2Fb", None, "{}")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(st.metrics().calls_observed.get(&[("method", "unregistered")]), 2);
}

#[tokio::test]
async fn consumer_header_is_taken_verbatim() {
    let app = build_router(state());

    let resp = send(&app, rpc("/main.Biz/Check", Some(" biz_user "), "{}")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let resp = send(&app, rpc("/main.Biz/Check", Some("biz_user"), "{}")).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
