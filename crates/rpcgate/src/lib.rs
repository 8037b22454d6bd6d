//! Top-level facade crate for rpcgate.
//!
//! Re-exports core types and the gateway library so users can depend on a single crate.

pub mod core {
    pub use rpcgate_core::*;
}

pub mod gateway {
    pub use rpcgate_gateway::*;
}
