//! HTTP and WebSocket server

pub mod http;
pub mod websocket;

pub use http::{build_router, run, shutdown_signal, AppState};
