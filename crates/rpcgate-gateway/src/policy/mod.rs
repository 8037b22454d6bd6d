//! Access policy layer (method patterns, per-consumer allowlists, interceptors).
//!
//! Compiles the `acl` table into matchers once at startup; the compiled policy
//! is immutable and shared by the unary and streaming interceptors.

pub mod engine;
pub mod interceptor;
pub mod pattern;

pub use engine::{AccessPolicy, DenyReason, PolicyDecision};
pub use interceptor::AccessInterceptor;
pub use pattern::MethodPattern;
