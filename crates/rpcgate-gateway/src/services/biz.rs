use async_trait::async_trait;
use serde_json::Value;

use rpcgate_core::error::{GateError, Result};
use rpcgate_core::protocol::messages::Nothing;

use crate::context::CallContext;
use crate::dispatch::{parse_request, to_response, MethodKind, RpcService};

/// Stateless business stubs. Every method echoes an empty `Nothing`.
#[derive(Default)]
pub struct BizService;

impl BizService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RpcService for BizService {
    fn name(&self) -> &'static str {
        "main.Biz"
    }

    fn methods(&self) -> &'static [(&'static str, MethodKind)] {
        &[
            ("Check", MethodKind::Unary),
            ("Add", MethodKind::Unary),
            ("Test", MethodKind::Unary),
        ]
    }

    async fn unary(&self, ctx: CallContext, req: Value) -> Result<Value> {
        let _req: Nothing = parse_request(req)?;
        match ctx.method().method() {
            "Check" | "Add" | "Test" => to_response(&Nothing { dummy: false }),
            other => Err(GateError::NotFound(format!("unknown biz method: {other}"))),
        }
    }
}
