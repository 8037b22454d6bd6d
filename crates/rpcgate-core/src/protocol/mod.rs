//! Protocol modules (method names, messages, NDJSON framing).
//!
//! - `method`: fully-qualified `/<service>/<method>` names.
//! - `messages`: request/response bodies of the built-in services.
//! - `ndjson`: one JSON document per line, used for server-streaming bodies.
//!
//! All parsers are panic-free: malformed input is reported as `GateError`.

pub mod messages;
pub mod method;
pub mod ndjson;
