//! Built-in services: the `main.Biz` stubs and the `main.Admin` monitoring streams.

pub mod admin;
pub mod biz;

pub use admin::AdminService;
pub use biz::BizService;
