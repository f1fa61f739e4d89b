//! Signed credential tokens.
//!
//! Tokens are HS256 JWTs. Every token carries a purpose so a password-reset
//! token can never be replayed as a session credential, and a stamp derived
//! from the account's password hash so that changing the password revokes
//! every token issued before the change.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Session,
    PasswordReset,
    EmailVerification,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id the token was issued to.
    pub sub: String,
    pub purpose: TokenPurpose,
    /// Credential stamp of the account at issue time.
    pub stamp: String,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
}

impl Claims {
    /// Whether the account's password is unchanged since the token was issued.
    pub fn matches_credentials(&self, password_hash: &str) -> bool {
        self.stamp == credential_stamp(password_hash)
    }
}

/// Short fingerprint of a stored password hash.
pub fn credential_stamp(password_hash: &str) -> String {
    Sha256::digest(password_hash.as_bytes())
        .iter()
        .take(8)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("token was issued for {0:?}")]
    WrongPurpose(TokenPurpose),

    #[error("token was revoked by a credential change")]
    Revoked,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            _ => TokenError::Malformed,
        }
    }
}

/// Issues and verifies tokens with a shared HMAC secret.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_ref()),
            decoding: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }

    /// Issue a token for `subject` valid for `ttl_secs` from now, bound to the
    /// account's current `password_hash`.
    pub fn issue(
        &self,
        subject: &str,
        password_hash: &str,
        purpose: TokenPurpose,
        ttl_secs: u64,
    ) -> Result<String, TokenError> {
        self.issue_at(
            subject,
            password_hash,
            purpose,
            ttl_secs,
            OffsetDateTime::now_utc().unix_timestamp(),
        )
    }

    pub fn issue_at(
        &self,
        subject: &str,
        password_hash: &str,
        purpose: TokenPurpose,
        ttl_secs: u64,
        now: i64,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: subject.to_string(),
            purpose,
            stamp: credential_stamp(password_hash),
            iat: now,
            exp: now.saturating_add(i64::try_from(ttl_secs).unwrap_or(i64::MAX)),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| TokenError::Signing(err.to_string()))
    }

    /// Verify signature, expiry and purpose. The caller still has to check
    /// the stamp against the stored account with [`Claims::matches_credentials`].
    pub fn verify(&self, token: &str, purpose: TokenPurpose) -> Result<Claims, TokenError> {
        let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)?.claims;
        if claims.purpose != purpose {
            return Err(TokenError::WrongPurpose(claims.purpose));
        }
        Ok(claims)
    }
}
