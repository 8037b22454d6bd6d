//! Dispatcher module exports.
//!
//! Re-exports the service registry, interceptor chain and streaming sink so
//! downstream consumers can depend on this module directly.

pub mod chain;
pub mod dispatcher;
pub mod stream;

pub use chain::{CallTap, InterceptorChain, StreamInterceptor, StreamNext, UnaryInterceptor, UnaryNext};
pub use dispatcher::{parse_request, to_response, Dispatcher, MethodKind, Route, RpcService, Unimplemented};
pub use stream::ServerStream;
