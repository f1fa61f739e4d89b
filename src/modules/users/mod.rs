pub mod models;
pub mod store;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use bookswap_authz::{hash_password, require_admin};
use bookswap_http::{AppError, Params, Payload};
use bookswap_kernel::{InitCtx, Migration, Module};
use serde_json::json;

use crate::error::ServiceError;
use crate::modules::auth::session::CurrentUser;
use crate::state::AppState;
use crate::utils::{run_blocking, FieldErrors, Page, PageQuery};
use models::{CreateUser, NewUser, UpdateUser, User};

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// Account management
pub struct UsersModule {
    state: AppState,
}

impl UsersModule {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for UsersModule {
    fn name(&self) -> &'static str {
        "user"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let users = ctx.db.read(store::count)?;
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            users,
            "user module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(list_users).post(create_user))
            .route(
                "/{id}",
                get(get_user).put(update_user).delete(delete_user),
            )
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = json!({ "$ref": "#/components/schemas/ErrorResponse" });
        let user = json!({ "$ref": "#/components/schemas/User" });
        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List users",
                        "tags": ["Users"],
                        "security": [{ "bearer": [] }],
                        "responses": {
                            "200": { "description": "Page of users" },
                            "401": { "description": "Missing or invalid credentials", "content": { "application/json": { "schema": error } } }
                        }
                    },
                    "post": {
                        "summary": "Create a user (admin)",
                        "tags": ["Users"],
                        "security": [{ "bearer": [] }],
                        "responses": {
                            "201": { "description": "Created user", "content": { "application/json": { "schema": user } } },
                            "400": { "description": "Invalid input", "content": { "application/json": { "schema": error } } },
                            "403": { "description": "Administrator role required", "content": { "application/json": { "schema": error } } },
                            "409": { "description": "Email or username taken", "content": { "application/json": { "schema": error } } }
                        }
                    }
                },
                "/{id}": {
                    "get": {
                        "summary": "Get a user",
                        "tags": ["Users"],
                        "security": [{ "bearer": [] }],
                        "responses": {
                            "200": { "description": "User", "content": { "application/json": { "schema": user } } },
                            "404": { "description": "User not found", "content": { "application/json": { "schema": error } } }
                        }
                    },
                    "put": {
                        "summary": "Update a user (admin)",
                        "tags": ["Users"],
                        "security": [{ "bearer": [] }],
                        "responses": {
                            "200": { "description": "Updated user", "content": { "application/json": { "schema": user } } },
                            "403": { "description": "Administrator role required", "content": { "application/json": { "schema": error } } },
                            "404": { "description": "User not found", "content": { "application/json": { "schema": error } } }
                        }
                    },
                    "delete": {
                        "summary": "Delete a user and their books (admin)",
                        "tags": ["Users"],
                        "security": [{ "bearer": [] }],
                        "responses": {
                            "200": { "description": "Deleted user", "content": { "application/json": { "schema": user } } },
                            "404": { "description": "User not found", "content": { "application/json": { "schema": error } } }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "User": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "email": { "type": "string", "format": "email" },
                            "username": { "type": "string" },
                            "emailVerified": { "type": "boolean" },
                            "role": { "type": "string", "enum": ["ADMIN", "USER"] }
                        },
                        "required": ["id", "email", "username", "emailVerified", "role"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                CREATE TABLE users (
                    id             TEXT PRIMARY KEY,
                    email          TEXT NOT NULL UNIQUE CHECK (email <> ''),
                    username       TEXT NOT NULL UNIQUE CHECK (username <> ''),
                    password_hash  TEXT NOT NULL,
                    email_verified INTEGER NOT NULL DEFAULT 0,
                    role           TEXT NOT NULL DEFAULT 'USER' CHECK (role IN ('ADMIN', 'USER'))
                );
                "#,
        }]
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "user module stopped");
        Ok(())
    }
}

/// Validate account fields shared by registration and admin creation.
/// Returns `(email, username, password)` with the email lower-cased.
pub fn validate_account(
    email: Option<String>,
    username: Option<String>,
    password: Option<String>,
) -> Result<(String, String, String), ServiceError> {
    let mut errors = FieldErrors::new();
    let email = errors.required("email", email).to_lowercase();
    let username = errors.required("username", username);
    let password = password.unwrap_or_default();

    if !email.is_empty() {
        errors.ensure(email.contains('@'), "email", "invalid");
    }
    if password.is_empty() {
        errors.push("password", "required");
    } else {
        errors.ensure(
            password.chars().count() >= MIN_PASSWORD_LEN,
            "password",
            "too_short",
        );
    }

    errors.finish("invalid account details")?;
    Ok((email, username, password))
}

async fn list_users(
    State(state): State<AppState>,
    _caller: CurrentUser,
    Params(query): Params<PageQuery>,
) -> Result<Json<Page<User>>, AppError> {
    let request = query.request();
    let page = state
        .read(move |conn| store::list(conn, request).map_err(ServiceError::from))
        .await?;
    Ok(Json(page))
}

async fn get_user(
    State(state): State<AppState>,
    _caller: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    let user = state
        .read(move |conn| store::find_by_id(conn, &id).map_err(ServiceError::from))
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;
    Ok(Json(user))
}

async fn create_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Payload(body): Payload<CreateUser>,
) -> Result<(StatusCode, Json<User>), AppError> {
    require_admin(&caller).map_err(ServiceError::from)?;
    let (email, username, password) = validate_account(body.email, body.username, body.password)?;
    let new = NewUser {
        email,
        username,
        password_hash: run_blocking(move || hash_password(&password).map_err(ServiceError::from))
            .await?,
        role: body.role.unwrap_or_default(),
        email_verified: false,
    };

    let user = state.write(move |conn| store::insert(conn, &new)).await?;

    tracing::info!(user_id = %user.id, created_by = %caller.user_id, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn update_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<String>,
    Payload(mut changes): Payload<UpdateUser>,
) -> Result<Json<User>, AppError> {
    require_admin(&caller).map_err(ServiceError::from)?;

    let mut errors = FieldErrors::new();
    if let Some(email) = changes.email.take() {
        let email = email.trim().to_lowercase();
        errors.ensure(email.contains('@'), "email", "invalid");
        changes.email = Some(email);
    }
    if let Some(username) = changes.username.take() {
        let username = username.trim().to_string();
        errors.ensure(!username.is_empty(), "username", "required");
        changes.username = Some(username);
    }
    errors.finish("invalid account details")?;

    let user = state
        .write(move |conn| store::update(conn, &id, &changes))
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;
    Ok(Json(user))
}

async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    require_admin(&caller).map_err(ServiceError::from)?;

    let user = state
        .write(move |conn| store::delete(conn, &id).map_err(ServiceError::from))
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    tracing::info!(user_id = %user.id, deleted_by = %caller.user_id, "user deleted");
    Ok(Json(user))
}

/// Create a new instance of the user module
pub fn create_module(state: AppState) -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(UsersModule::new(state))
}
