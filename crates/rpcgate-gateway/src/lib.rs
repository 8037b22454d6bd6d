//! rpcgate gateway library entry.
//!
//! This crate wires the transport, access policy, interceptor chain,
//! telemetry fan-out and built-in services into one runtime. It is consumed
//! by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod obs;
pub mod ops;
pub mod policy;
pub mod realtime;
pub mod router;
pub mod runtime;
pub mod services;
pub mod transport;

pub use runtime::{start, start_with_acl_json, Phase, ServerHandle};
