pub mod models;
pub mod session;

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{header::SET_COOKIE, StatusCode},
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use bookswap_authz::{hash_password, verify_password, Role, TokenError, TokenPurpose};
use bookswap_http::{AppError, Payload};
use bookswap_kernel::{InitCtx, Module};
use serde_json::json;

use crate::error::ServiceError;
use crate::modules::users::{self, models::NewUser, models::User, store as user_store};
use crate::state::AppState;
use crate::utils::{run_blocking, FieldErrors};
use models::{
    CheckResponse, ConfirmEmailRequest, ForgotPasswordRequest, LoginRequest, LoginResponse,
    RegisterRequest, ResetPasswordRequest,
};
use session::{session_cookie, CurrentUser};

/// Registration, login and account recovery. Routes live at the root.
pub struct AuthModule {
    state: AppState,
}

impl AuthModule {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for AuthModule {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn mount_path(&self) -> String {
        "/".to_string()
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            session_ttl_secs = ctx.settings.auth.session_ttl_secs,
            "auth module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/register", post(register))
            .route("/login", post(login))
            .route("/check", get(check))
            .route("/forgot-password", post(forgot_password))
            .route("/reset-password", post(reset_password))
            .route("/verify-email", post(request_verification))
            .route("/verify-email/confirm", post(confirm_email))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = json!({ "$ref": "#/components/schemas/ErrorResponse" });
        let user = json!({ "$ref": "#/components/schemas/User" });
        let credentials = json!({
            "type": "object",
            "properties": {
                "email": { "type": "string", "format": "email" },
                "password": { "type": "string" }
            },
            "required": ["email", "password"]
        });
        Some(json!({
            "paths": {
                "/register": {
                    "post": {
                        "summary": "Create an account",
                        "tags": ["Auth"],
                        "requestBody": { "content": { "application/json": { "schema": {
                            "type": "object",
                            "properties": {
                                "email": { "type": "string", "format": "email" },
                                "username": { "type": "string" },
                                "password": { "type": "string", "minLength": users::MIN_PASSWORD_LEN }
                            },
                            "required": ["email", "username", "password"]
                        } } } },
                        "responses": {
                            "201": { "description": "Account created", "content": { "application/json": { "schema": user } } },
                            "400": { "description": "Invalid input", "content": { "application/json": { "schema": error } } },
                            "409": { "description": "Email or username taken", "content": { "application/json": { "schema": error } } }
                        }
                    }
                },
                "/login": {
                    "post": {
                        "summary": "Exchange credentials for a session token",
                        "tags": ["Auth"],
                        "requestBody": { "content": { "application/json": { "schema": credentials } } },
                        "responses": {
                            "200": { "description": "Session issued; also set as the auth_token cookie", "content": { "application/json": { "schema": { "$ref": "#/components/schemas/LoginResponse" } } } },
                            "401": { "description": "Invalid email or password", "content": { "application/json": { "schema": error } } }
                        }
                    }
                },
                "/check": {
                    "get": {
                        "summary": "Resolve the caller's session",
                        "tags": ["Auth"],
                        "security": [{ "bearer": [] }],
                        "responses": {
                            "200": { "description": "Caller id" },
                            "401": { "description": "Missing or invalid credentials", "content": { "application/json": { "schema": error } } }
                        }
                    }
                },
                "/forgot-password": {
                    "post": {
                        "summary": "Send a password reset token",
                        "tags": ["Auth"],
                        "responses": { "202": { "description": "Accepted whether or not the account exists" } }
                    }
                },
                "/reset-password": {
                    "post": {
                        "summary": "Set a new password with a reset token",
                        "tags": ["Auth"],
                        "responses": {
                            "204": { "description": "Password changed" },
                            "401": { "description": "Invalid or expired token", "content": { "application/json": { "schema": error } } }
                        }
                    }
                },
                "/verify-email": {
                    "post": {
                        "summary": "Send an email verification token",
                        "tags": ["Auth"],
                        "security": [{ "bearer": [] }],
                        "responses": { "202": { "description": "Verification sent" } }
                    }
                },
                "/verify-email/confirm": {
                    "post": {
                        "summary": "Confirm an email address",
                        "tags": ["Auth"],
                        "responses": {
                            "200": { "description": "Verified account", "content": { "application/json": { "schema": user } } },
                            "401": { "description": "Invalid or expired token", "content": { "application/json": { "schema": error } } }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "LoginResponse": {
                        "type": "object",
                        "properties": {
                            "token": { "type": "string" },
                            "userId": { "type": "string" }
                        },
                        "required": ["token", "userId"]
                    }
                }
            }
        }))
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "auth module stopped");
        Ok(())
    }
}

async fn register(
    State(state): State<AppState>,
    Payload(body): Payload<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let (email, username, password) =
        users::validate_account(body.email, body.username, body.password)?;
    let new = NewUser {
        email,
        username,
        password_hash: run_blocking(move || hash_password(&password).map_err(ServiceError::from))
            .await?,
        role: Role::User,
        email_verified: false,
    };

    let user = state.write(move |conn| user_store::insert(conn, &new)).await?;

    tracing::info!(user_id = %user.id, "account registered");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn login(
    State(state): State<AppState>,
    Payload(body): Payload<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut errors = FieldErrors::new();
    let email = errors.required("email", body.email).to_lowercase();
    let password = body.password.unwrap_or_default();
    errors.ensure(!password.is_empty(), "password", "required");
    errors.finish("email and password are required")?;

    let found = state
        .read(move |conn| user_store::find_credentials(conn, &email).map_err(ServiceError::from))
        .await?;

    // Same answer for an unknown email and a wrong password.
    let rejected = || AppError::unauthorized("invalid email or password");
    let (user, stored_hash) = found.ok_or_else(rejected)?;
    let stored = stored_hash.clone();
    let valid = run_blocking(move || {
        verify_password(&password, &stored).map_err(ServiceError::from)
    })
    .await?;
    if !valid {
        tracing::warn!(user_id = %user.id, "login rejected");
        return Err(rejected());
    }

    let ttl = state.auth.session_ttl_secs;
    let token = state
        .tokens
        .issue(&user.id, &stored_hash, TokenPurpose::Session, ttl)
        .map_err(ServiceError::from)?;
    tracing::info!(user_id = %user.id, "session issued");

    Ok((
        AppendHeaders([(SET_COOKIE, session_cookie(&token, ttl))]),
        Json(LoginResponse {
            token,
            user_id: user.id,
        }),
    ))
}

async fn check(CurrentUser(caller): CurrentUser) -> Json<CheckResponse> {
    Json(CheckResponse {
        user_id: caller.user_id,
    })
}

async fn forgot_password(
    State(state): State<AppState>,
    Payload(body): Payload<ForgotPasswordRequest>,
) -> Result<StatusCode, AppError> {
    let mut errors = FieldErrors::new();
    let email = errors.required("email", body.email).to_lowercase();
    errors.finish("email is required")?;

    let found = state
        .read(move |conn| user_store::find_credentials(conn, &email).map_err(ServiceError::from))
        .await?;

    match found {
        Some((user, password_hash)) => {
            let token = state
                .tokens
                .issue(
                    &user.id,
                    &password_hash,
                    TokenPurpose::PasswordReset,
                    state.auth.reset_ttl_secs,
                )
                .map_err(ServiceError::from)?;
            state.outbox.deliver(
                &user.email,
                "Reset your BookSwap password",
                &format!("Use this token to choose a new password: {token}"),
            );
            tracing::info!(user_id = %user.id, "password reset issued");
        }
        None => tracing::debug!("password reset requested for unknown email"),
    }

    Ok(StatusCode::ACCEPTED)
}

async fn reset_password(
    State(state): State<AppState>,
    Payload(body): Payload<ResetPasswordRequest>,
) -> Result<StatusCode, AppError> {
    let mut errors = FieldErrors::new();
    let token = errors.required("token", body.token);
    let password = body.password.unwrap_or_default();
    if password.is_empty() {
        errors.push("password", "required");
    } else {
        errors.ensure(
            password.chars().count() >= users::MIN_PASSWORD_LEN,
            "password",
            "too_short",
        );
    }
    errors.finish("invalid password reset")?;

    let claims = state
        .tokens
        .verify(&token, TokenPurpose::PasswordReset)
        .map_err(ServiceError::from)?;
    let password_hash =
        run_blocking(move || hash_password(&password).map_err(ServiceError::from)).await?;

    let user_id = claims.sub.clone();
    state
        .write(move |conn| -> Result<(), ServiceError> {
            // The stamp is compared inside the write so a token is spent exactly once.
            let (_, current) = user_store::find_credentials_by_id(conn, &claims.sub)?
                .ok_or_else(|| ServiceError::NotFound("user not found".to_string()))?;
            if !claims.matches_credentials(&current) {
                return Err(ServiceError::from(TokenError::Revoked));
            }
            user_store::set_password(conn, &claims.sub, &password_hash)?;
            Ok(())
        })
        .await?;

    tracing::info!(%user_id, "password reset");
    Ok(StatusCode::NO_CONTENT)
}

async fn request_verification(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<StatusCode, AppError> {
    let user_id = caller.user_id.clone();
    let (user, password_hash) = state
        .read(move |conn| {
            user_store::find_credentials_by_id(conn, &user_id).map_err(ServiceError::from)
        })
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    let token = state
        .tokens
        .issue(
            &user.id,
            &password_hash,
            TokenPurpose::EmailVerification,
            state.auth.reset_ttl_secs,
        )
        .map_err(ServiceError::from)?;
    state.outbox.deliver(
        &user.email,
        "Confirm your BookSwap email",
        &format!("Use this token to confirm your email address: {token}"),
    );

    tracing::info!(user_id = %user.id, "email verification issued");
    Ok(StatusCode::ACCEPTED)
}

async fn confirm_email(
    State(state): State<AppState>,
    Payload(body): Payload<ConfirmEmailRequest>,
) -> Result<Json<User>, AppError> {
    let mut errors = FieldErrors::new();
    let token = errors.required("token", body.token);
    errors.finish("token is required")?;

    let claims = state
        .tokens
        .verify(&token, TokenPurpose::EmailVerification)
        .map_err(ServiceError::from)?;

    let user = state
        .write(move |conn| {
            user_store::mark_email_verified(conn, &claims.sub).map_err(ServiceError::from)
        })
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    tracing::info!(user_id = %user.id, "email verified");
    Ok(Json(user))
}

/// Create a new instance of the auth module
pub fn create_module(state: AppState) -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(AuthModule::new(state))
}
