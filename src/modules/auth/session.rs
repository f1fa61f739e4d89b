//! Request authentication.
//!
//! A session token is read from `Authorization: Bearer <token>` or, for the
//! browser client, the `auth_token` cookie. The bearer header wins when both
//! are present.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
        HeaderMap,
    },
};
use bookswap_authz::{Identity, TokenError, TokenPurpose};
use bookswap_http::AppError;

use crate::error::ServiceError;
use crate::modules::users::store as users;
use crate::state::AppState;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "auth_token";

/// The authenticated caller, resolved once per request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let token = credential(&parts.headers)
            .ok_or_else(|| AppError::unauthorized("authentication required"))?;
        let claims = state
            .tokens
            .verify(&token, TokenPurpose::Session)
            .map_err(|err| AppError::unauthorized(err.to_string()))?;

        // Role is read from the store, never from the token.
        let sub = claims.sub.clone();
        let (user, password_hash) = state
            .read(move |conn| users::find_credentials_by_id(conn, &sub).map_err(ServiceError::from))
            .await?
            .ok_or_else(|| AppError::unauthorized("account no longer exists"))?;
        if !claims.matches_credentials(&password_hash) {
            return Err(AppError::unauthorized(TokenError::Revoked.to_string()));
        }

        Ok(CurrentUser(Identity::new(user.id, user.role)))
    }
}

/// The session token presented with a request, if any.
pub fn credential(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| cookie_token(headers))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value for a freshly issued session.
pub fn session_cookie(token: &str, max_age_secs: u64) -> String {
    format!("{SESSION_COOKIE}={token}; HttpOnly; Path=/; SameSite=Lax; Max-Age={max_age_secs}")
}
