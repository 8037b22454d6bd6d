//! RPC call handler.
//!
//! Responsibilities:
//! - Build the `CallContext` from the undecoded request path, the `consumer`
//!   header and the peer address
//! - Run the tap for every call, before anything can refuse it
//! - Route to the unary or streaming interceptor chain
//! - Streaming: hold the response headers until the handler accepts, so a
//!   denial still becomes a plain HTTP error

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::stream;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use rpcgate_core::error::GateError;
use rpcgate_core::protocol::method::MethodName;
use rpcgate_core::protocol::ndjson::{self, ErrorFrame};

use crate::app_state::AppState;
use crate::context::CallContext;
use crate::dispatch::{MethodKind, RpcService, ServerStream, Unimplemented};
use crate::transport::codec::{decode_request, ErrorResponse};

/// Frames buffered between a streaming handler and the HTTP body.
const STREAM_FRAME_BUFFER: usize = 64;

pub async fn call(
    State(app): State<AppState>,
    uri: Uri,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Percent-escapes stay as sent, so `%2F` cannot split a segment.
    let method = match MethodName::parse(uri.path()) {
        Ok(m) => m,
        Err(e) => return ErrorResponse(e).into_response(),
    };
    let ctx = CallContext::from_headers(method, &headers, peer.map(|ConnectInfo(addr)| addr));

    app.chain().observe(&ctx);

    if app.is_draining() {
        return refuse(&app, GateError::Unavailable("server is shutting down".into()));
    }

    let req = match decode_request(&body) {
        Ok(v) => v,
        Err(e) => return refuse(&app, e),
    };

    let (kind, service): (MethodKind, Arc<dyn RpcService>) = match app.dispatcher().resolve(ctx.method().as_str()) {
        Some(route) => (route.kind, route.service),
        None => (MethodKind::Unary, Arc::new(Unimplemented)),
    };

    match kind {
        MethodKind::Unary => unary(app, ctx, req, service).await,
        MethodKind::ServerStreaming => server_streaming(app, ctx, req, service).await,
    }
}

fn refuse(app: &AppState, err: GateError) -> Response {
    app.metrics()
        .call_errors
        .inc(&[("code", err.client_code().as_str())]);
    ErrorResponse(err).into_response()
}

async fn unary(app: AppState, ctx: CallContext, req: Value, service: Arc<dyn RpcService>) -> Response {
    match app.chain().run_unary(ctx, req, service.as_ref()).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => refuse(&app, e),
    }
}

async fn server_streaming(app: AppState, ctx: CallContext, req: Value, service: Arc<dyn RpcService>) -> Response {
    let (frames_tx, frames_rx) = mpsc::channel::<Bytes>(STREAM_FRAME_BUFFER);
    let (accept_tx, accept_rx) = oneshot::channel();
    let sink = ServerStream::new(frames_tx.clone(), accept_tx);

    let chain = app.chain();
    let method = ctx.method().to_string();
    let mut task = tokio::spawn(async move { chain.run_stream(ctx, req, sink, service.as_ref()).await });

    // The sink is dropped without accepting when the chain refuses the call.
    if accept_rx.await.is_err() {
        return match (&mut task).await {
            Ok(Ok(())) => ndjson_response(Body::empty()),
            Ok(Err(e)) => refuse(&app, e),
            Err(e) => refuse(&app, GateError::Internal(format!("stream task failed: {e}"))),
        };
    }

    // Accepted: errors from here on travel as a final NDJSON line.
    let metrics = app.metrics();
    tokio::spawn(async move {
        let err = match task.await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e,
            Err(e) => GateError::Internal(format!("stream task failed: {e}")),
        };
        metrics.call_errors.inc(&[("code", err.client_code().as_str())]);
        tracing::debug!(method = %method, error = %err, "stream ended with error");
        if let Ok(line) = ndjson::encode_line(&ErrorFrame::from_error(&err)) {
            let _ = frames_tx.send(line).await;
        }
    });

    let body = stream::unfold(frames_rx, |mut rx| async move {
        rx.recv().await.map(|frame| (Ok::<Bytes, Infallible>(frame), rx))
    });
    ndjson_response(Body::from_stream(body))
}

fn ndjson_response(body: Body) -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, ndjson::CONTENT_TYPE)], body).into_response()
}
