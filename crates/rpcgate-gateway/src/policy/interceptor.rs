//! Access interceptors: one policy, two hooks (unary and server-streaming).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use rpcgate_core::error::Result;

use crate::context::CallContext;
use crate::dispatch::{ServerStream, StreamInterceptor, StreamNext, UnaryInterceptor, UnaryNext};
use crate::obs::GatewayMetrics;

use super::engine::{AccessPolicy, PolicyDecision};

/// Wraps the next handler only when the policy allows the call.
pub struct AccessInterceptor {
    policy: Arc<AccessPolicy>,
    metrics: Arc<GatewayMetrics>,
}

impl AccessInterceptor {
    pub fn new(policy: Arc<AccessPolicy>, metrics: Arc<GatewayMetrics>) -> Self {
        Self { policy, metrics }
    }

    fn check(&self, ctx: &CallContext) -> Result<()> {
        match self.policy.authorize(ctx.consumer(), ctx.method().as_str()) {
            PolicyDecision::Allow { rule } => {
                self.metrics.policy_decisions.inc(&[("decision", "allow")]);
                tracing::trace!(consumer = %ctx.consumer(), method = %ctx.method(), rule, "call allowed");
                Ok(())
            }
            PolicyDecision::Deny(reason) => {
                let err = reason.into_error();
                self.metrics
                    .policy_decisions
                    .inc(&[("decision", "deny"), ("code", err.client_code().as_str())]);
                tracing::debug!(
                    consumer = %ctx.consumer(),
                    method = %ctx.method(),
                    peer = %ctx.peer(),
                    reason = reason.as_str(),
                    "call denied"
                );
                Err(err)
            }
        }
    }
}

#[async_trait]
impl UnaryInterceptor for AccessInterceptor {
    async fn intercept_unary(&self, ctx: CallContext, req: Value, next: &dyn UnaryNext) -> Result<Value> {
        self.check(&ctx)?;
        next.run(ctx, req).await
    }
}

#[async_trait]
impl StreamInterceptor for AccessInterceptor {
    async fn intercept_stream(
        &self,
        ctx: CallContext,
        req: Value,
        stream: ServerStream,
        next: &dyn StreamNext,
    ) -> Result<()> {
        self.check(&ctx)?;
        next.run(ctx, req, stream).await
    }
}
