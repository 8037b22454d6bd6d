use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderMap;

use rpcgate_core::protocol::method::MethodName;

/// Metadata key carrying the caller identity.
pub const CONSUMER_HEADER: &str = "consumer";

/// Immutable metadata for one inbound call.
#[derive(Debug, Clone)]
pub struct CallContext {
    method: Arc<MethodName>,
    consumer: Arc<str>,
    peer: Arc<str>,
}

impl CallContext {
    pub fn new(method: MethodName, consumer: impl Into<Arc<str>>, peer: impl Into<Arc<str>>) -> Self {
        Self {
            method: Arc::new(method),
            consumer: consumer.into(),
            peer: peer.into(),
        }
    }

    /// Build from request metadata. The consumer header is taken verbatim; a
    /// missing or non-UTF-8 header yields the anonymous (empty) consumer.
    pub fn from_headers(method: MethodName, headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let consumer = headers
            .get(CONSUMER_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let peer = peer.map(|p| p.to_string()).unwrap_or_else(|| "unknown".to_string());
        Self::new(method, consumer, peer)
    }

    pub fn method(&self) -> &MethodName {
        &self.method
    }
    pub fn consumer(&self) -> &str {
        &self.consumer
    }
    pub fn peer(&self) -> &str {
        &self.peer
    }
}
