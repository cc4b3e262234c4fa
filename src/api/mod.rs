//! API server implementation
//!
//! REST endpoints for listing request logs, plus demo views that exercise
//! each tracking configuration.

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;

pub use server::{ApiServer, AppState};
