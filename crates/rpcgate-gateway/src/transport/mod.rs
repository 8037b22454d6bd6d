//! Transport layer (RPC over HTTP).
//!
//! Every method is `POST /<service>/<method>` with a JSON body. Unary calls
//! answer with a JSON body; server-streaming calls answer with NDJSON.

pub mod codec;
pub mod http;
