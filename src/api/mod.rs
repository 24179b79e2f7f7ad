//! API client module for the CRM backend.
//!
//! Provides the HTTP transport, JSON session-file token storage,
//! error classification and request/response types matching the CRM API.

pub mod auth;
pub mod client;
pub mod error;
pub mod status;
pub mod transport;
pub mod types;
