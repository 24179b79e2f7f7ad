//! Request and response types for the CRM backend API.
//!
//! Field names are snake_case, matching the API's JSON format.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Response from POST /auth/token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// A user record as returned by `crm/users/*`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub first_name: String,
    pub email: String,
    pub telephone: String,
    /// Fields the client does not interpret, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Body for POST crm/users/ and PUT crm/users/{id}.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub first_name: String,
    pub email: String,
    pub telephone: String,
}

/// Partial modification of a user. Missing fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telephone: Option<String>,
}

impl UserUpdate {
    /// The full body, if every field is set.
    pub fn complete(&self) -> Option<NewUser> {
        Some(NewUser {
            name: self.name.clone()?,
            first_name: self.first_name.clone()?,
            email: self.email.clone()?,
            telephone: self.telephone.clone()?,
        })
    }

    /// Fill the missing fields from `current`.
    pub fn merge_onto(&self, current: &User) -> NewUser {
        NewUser {
            name: self.name.clone().unwrap_or_else(|| current.name.clone()),
            first_name: self
                .first_name
                .clone()
                .unwrap_or_else(|| current.first_name.clone()),
            email: self.email.clone().unwrap_or_else(|| current.email.clone()),
            telephone: self
                .telephone
                .clone()
                .unwrap_or_else(|| current.telephone.clone()),
        }
    }
}

impl From<NewUser> for UserUpdate {
    fn from(user: NewUser) -> Self {
        Self {
            name: Some(user.name),
            first_name: Some(user.first_name),
            email: Some(user.email),
            telephone: Some(user.telephone),
        }
    }
}

/// Email/password pair kept in the session file when "remember me" asks for it.
///
/// The password is wiped from memory on drop and never printed by `Debug`.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}
