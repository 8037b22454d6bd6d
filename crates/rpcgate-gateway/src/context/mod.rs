//! Per-call context shared across layers.
//!
//! `CallContext` is built once by the transport and then handed to the tap,
//! the interceptors and finally the service, so none of them depend on
//! transport specifics.

pub mod call;

pub use call::{CallContext, CONSUMER_HEADER};
