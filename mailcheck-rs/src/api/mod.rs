//! REST API module for mailcheck
//!
//! HTTP endpoints for verification jobs and list cleaning, plus the small
//! web UI that submits a list and polls job progress.

pub mod handlers;
pub mod server;
pub mod web;

pub use server::ApiServer;
