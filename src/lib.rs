//! Async client for the CRM backend.
//!
//! Handles the bearer-token session lifecycle (login, token persistence,
//! reload-and-probe on startup, reconnect from remembered credentials),
//! CRUD on the `users` resource, and classification of every outcome into
//! a small fixed [`Status`] set for the UI layer.

pub mod api;
pub mod config;

pub use api::auth::SessionStore;
pub use api::client::{CrmClient, Remember};
pub use api::error::{ApiError, ApiResult, TransportError};
pub use api::status::{verify_request, Status};
pub use api::transport::{Body, HttpTransport, Payload, RequestOptions};
pub use api::types::{Credentials, NewUser, TokenResponse, User, UserUpdate};
pub use config::ClientConfig;
