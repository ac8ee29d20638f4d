//! JSON-RPC server over the StrataUI catalog engine.
//!
//! Exposes stateless catalog queries and long-lived catalog sessions (one
//! per open view) on `POST /rpc`.

pub mod handlers;
pub mod server;

pub use server::{build_router, serve, start_server, AppState, SESSION_IDLE_TIMEOUT};
