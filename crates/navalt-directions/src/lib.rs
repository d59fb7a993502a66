//! Navalt Directions - HTTP client for the directions service
//!
//! Issues online route requests and classifies the outcome for retrying.

pub mod client;

pub use client::{classify_status, redact_access_token, DirectionsClient, SERVER_ERROR_RETRY_DELAY};
