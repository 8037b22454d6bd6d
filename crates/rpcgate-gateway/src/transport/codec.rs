//! Decode-once codec for request bodies and error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use rpcgate_core::error::{GateError, Result};

/// Parse a request body. An empty body is the default request (`null`).
pub fn decode_request(body: &[u8]) -> Result<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| GateError::BadRequest(format!("invalid request json: {e}")))
}

/// HTTP rendering of a `GateError`.
pub struct ErrorResponse(pub GateError);

impl From<GateError> for ErrorResponse {
    fn from(e: GateError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let code = self.0.client_code();
        if let GateError::Internal(detail) = &self.0 {
            tracing::error!(%detail, "internal error returned to caller");
        }
        let status = StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "error": code.as_str(),
            "message": self.0.client_message(),
        }));
        (status, body).into_response()
    }
}
