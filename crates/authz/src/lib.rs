//! Identity, credentials, and authorization guards.
//!
//! Authorization is a flat predicate over an [`Identity`]: handlers resolve the
//! caller once per request and pass the identity explicitly into whatever
//! operation they invoke.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod password;
pub mod token;

pub use password::{hash_password, verify_password, PasswordError};
pub use token::{credential_stamp, Claims, TokenError, TokenPurpose, TokenSigner};

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "USER" => Ok(Role::User),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

/// Capability check for privileged operations.
pub fn is_admin(identity: &Identity) -> bool {
    identity.role == Role::Admin
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("administrator role required")]
pub struct AdminRequired;

/// Guard for the entry of admin-only operations.
pub fn require_admin(identity: &Identity) -> Result<(), AdminRequired> {
    if is_admin(identity) {
        Ok(())
    } else {
        tracing::debug!(
            target: "bookswap-authz",
            user_id = %identity.user_id,
            "admin capability denied"
        );
        Err(AdminRequired)
    }
}
