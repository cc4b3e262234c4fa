//! API Tracking - request logging for axum services
//!
//! Records one structured entry per tracked HTTP request and exposes the
//! recorded entries through a paginated listing API.
//!
//! ## Features
//!
//! - Per-route tracking middleware with method filters and custom decisions
//! - Errors-only mode that records server faults and handler panics
//! - Case-insensitive redaction of sensitive fields at any nesting depth
//! - Request body capture that leaves the body intact for the handler
//! - PostgreSQL storage with user resolution in a constant number of queries

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod repository;
pub mod tracking;

pub use config::Config;
pub use database::Database;
pub use error::{Result, TrackingError};
pub use tracking::{track, Tracker, TrackingConfig};
