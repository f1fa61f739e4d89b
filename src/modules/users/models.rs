use bookswap_authz::Role;
use serde::{Deserialize, Serialize};

/// Public view of an account. The password hash never leaves the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique identifier for the user
    pub id: String,
    /// Lower-cased email address, unique
    pub email: String,
    /// Display name, unique
    pub username: String,
    pub email_verified: bool,
    pub role: Role,
}

/// Row to insert; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub email_verified: bool,
}

/// Request model for an administrator creating an account.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

/// Request model for an administrator editing an account. Absent fields are
/// left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    pub email: Option<String>,
    pub username: Option<String>,
    pub role: Option<Role>,
    pub email_verified: Option<bool>,
}
