//! API request handlers

pub mod auth;
pub mod demo;
pub mod health;
pub mod logs;
