//! Interceptor chain: pre-authorization taps plus unary and streaming
//! interceptors, applied in registration order around the service call.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use rpcgate_core::error::Result;

use crate::context::CallContext;
use crate::dispatch::dispatcher::RpcService;
use crate::dispatch::stream::ServerStream;

/// Observes every inbound call before any interceptor runs. Must not block.
pub trait CallTap: Send + Sync {
    fn on_call(&self, ctx: &CallContext);
}

/// Remainder of the unary chain.
#[async_trait]
pub trait UnaryNext: Send + Sync {
    async fn run(&self, ctx: CallContext, req: Value) -> Result<Value>;
}

/// Remainder of the streaming chain.
#[async_trait]
pub trait StreamNext: Send + Sync {
    async fn run(&self, ctx: CallContext, req: Value, stream: ServerStream) -> Result<()>;
}

#[async_trait]
pub trait UnaryInterceptor: Send + Sync {
    async fn intercept_unary(&self, ctx: CallContext, req: Value, next: &dyn UnaryNext) -> Result<Value>;
}

#[async_trait]
pub trait StreamInterceptor: Send + Sync {
    async fn intercept_stream(
        &self,
        ctx: CallContext,
        req: Value,
        stream: ServerStream,
        next: &dyn StreamNext,
    ) -> Result<()>;
}

#[derive(Default)]
pub struct InterceptorChain {
    taps: Vec<Arc<dyn CallTap>>,
    unary: Vec<Arc<dyn UnaryInterceptor>>,
    stream: Vec<Arc<dyn StreamInterceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tap(mut self, tap: Arc<dyn CallTap>) -> Self {
        self.taps.push(tap);
        self
    }

    pub fn with_unary(mut self, i: Arc<dyn UnaryInterceptor>) -> Self {
        self.unary.push(i);
        self
    }

    pub fn with_stream(mut self, i: Arc<dyn StreamInterceptor>) -> Self {
        self.stream.push(i);
        self
    }

    /// Run every tap. Taps have no say over the call.
    pub fn observe(&self, ctx: &CallContext) {
        for tap in &self.taps {
            tap.on_call(ctx);
        }
    }

    pub async fn run_unary(&self, ctx: CallContext, req: Value, service: &dyn RpcService) -> Result<Value> {
        UnaryLink {
            rest: &self.unary,
            service,
        }
        .run(ctx, req)
        .await
    }

    pub async fn run_stream(
        &self,
        ctx: CallContext,
        req: Value,
        stream: ServerStream,
        service: &dyn RpcService,
    ) -> Result<()> {
        StreamLink {
            rest: &self.stream,
            service,
        }
        .run(ctx, req, stream)
        .await
    }
}

struct UnaryLink<'a> {
    rest: &'a [Arc<dyn UnaryInterceptor>],
    service: &'a dyn RpcService,
}

#[async_trait]
impl<'a> UnaryNext for UnaryLink<'a> {
    async fn run(&self, ctx: CallContext, req: Value) -> Result<Value> {
        match self.rest.split_first() {
            Some((head, rest)) => {
                let next = UnaryLink {
                    rest,
                    service: self.service,
                };
                head.intercept_unary(ctx, req, &next).await
            }
            None => self.service.unary(ctx, req).await,
        }
    }
}

struct StreamLink<'a> {
    rest: &'a [Arc<dyn StreamInterceptor>],
    service: &'a dyn RpcService,
}

#[async_trait]
impl<'a> StreamNext for StreamLink<'a> {
    async fn run(&self, ctx: CallContext, req: Value, stream: ServerStream) -> Result<()> {
        match self.rest.split_first() {
            Some((head, rest)) => {
                let next = StreamLink {
                    rest,
                    service: self.service,
                };
                head.intercept_stream(ctx, req, stream, &next).await
            }
            None => self.service.server_stream(ctx, req, stream).await,
        }
    }
}
