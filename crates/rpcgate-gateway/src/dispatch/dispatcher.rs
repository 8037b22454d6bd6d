use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use rpcgate_core::error::{GateError, Result};

use crate::context::CallContext;
use crate::dispatch::stream::ServerStream;

/// How a method exchanges messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Unary,
    ServerStreaming,
}

/// An RPC service. Methods are routed by name; the defaults answer
/// `NOT_FOUND` so a service only implements the kinds it exposes.
#[async_trait]
pub trait RpcService: Send + Sync {
    /// Service name, e.g. `main.Biz`.
    fn name(&self) -> &'static str;

    fn methods(&self) -> &'static [(&'static str, MethodKind)];

    async fn unary(&self, ctx: CallContext, req: Value) -> Result<Value> {
        let _ = req;
        Err(GateError::NotFound(format!("unknown method: {}", ctx.method())))
    }

    async fn server_stream(&self, ctx: CallContext, req: Value, stream: ServerStream) -> Result<()> {
        let _ = (req, stream);
        Err(GateError::NotFound(format!("unknown method: {}", ctx.method())))
    }
}

/// Terminal for calls that resolve to no service. Still runs behind the
/// interceptors so unauthorized callers cannot probe the method table.
pub struct Unimplemented;

#[async_trait]
impl RpcService for Unimplemented {
    fn name(&self) -> &'static str {
        ""
    }
    fn methods(&self) -> &'static [(&'static str, MethodKind)] {
        &[]
    }
}

/// A resolved method.
#[derive(Clone)]
pub struct Route {
    pub kind: MethodKind,
    pub service: Arc<dyn RpcService>,
}

/// Registry of services keyed by full method name.
#[derive(Default)]
pub struct Dispatcher {
    routes: DashMap<String, Route>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            routes: DashMap::new(),
        }
    }

    pub fn register(&self, service: Arc<dyn RpcService>) {
        for (method, kind) in service.methods() {
            let full = format!("/{}/{}", service.name(), method);
            tracing::debug!(method = %full, ?kind, "registered rpc method");
            self.routes.insert(
                full,
                Route {
                    kind: *kind,
                    service: Arc::clone(&service),
                },
            );
        }
    }

    pub fn resolve(&self, full_method: &str) -> Option<Route> {
        self.routes.get(full_method).map(|r| r.value().clone())
    }

    pub fn contains(&self, full_method: &str) -> bool {
        self.routes.contains_key(full_method)
    }

    pub fn registered_methods(&self) -> Vec<String> {
        let mut out: Vec<String> = self.routes.iter().map(|e| e.key().clone()).collect();
        out.sort();
        out
    }
}

/// Decode a request body. `null` (empty body) becomes the default request.
pub fn parse_request<T: DeserializeOwned + Default>(req: Value) -> Result<T> {
    if req.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(req).map_err(|e| GateError::BadRequest(format!("invalid request: {e}")))
}

/// Encode a response message.
pub fn to_response<T: serde::Serialize>(msg: &T) -> Result<Value> {
    serde_json::to_value(msg).map_err(|e| GateError::Internal(format!("response encode failed: {e}")))
}
