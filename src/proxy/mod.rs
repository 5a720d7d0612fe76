//! HTTP relay server

mod auth;
mod handler;
mod legacy;
mod passthrough;
mod request_log;
pub mod server;
pub mod streaming;

pub use handler::ChatRelay;
pub use server::{build_router, run_server, ProxyState};
