pub mod models;
pub mod store;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use bookswap_authz::{require_admin, Identity};
use bookswap_http::{AppError, Params, Payload};
use bookswap_kernel::{InitCtx, Migration, Module};
use rusqlite::Connection;
use serde_json::json;

use crate::error::ServiceError;
use crate::modules::auth::session::CurrentUser;
use crate::state::AppState;
use crate::utils::{pagination::MAX_LIMIT, FieldErrors, Page, PageQuery};
use models::{Book, CreateBook, Ownership, UpdateBook};

/// Book catalog
pub struct BooksModule {
    state: AppState,
}

impl BooksModule {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "book"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "book module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(list_books).post(create_book))
            .route("/me", get(list_my_books))
            .route("/me/", get(list_my_books))
            .route(
                "/{id}",
                get(get_book).patch(update_book).delete(delete_book),
            )
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = json!({ "$ref": "#/components/schemas/ErrorResponse" });
        let book = json!({ "$ref": "#/components/schemas/Book" });
        let page = json!({ "$ref": "#/components/schemas/BookPage" });
        let paging = json!([
            { "name": "page", "in": "query", "schema": { "type": "integer", "minimum": 1 } },
            { "name": "limit", "in": "query", "schema": { "type": "integer", "minimum": 1, "maximum": MAX_LIMIT } },
            { "name": "search", "in": "query", "schema": { "type": "string" } }
        ]);
        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "Browse books held by other users",
                        "tags": ["Books"],
                        "security": [{ "bearer": [] }],
                        "parameters": paging,
                        "responses": {
                            "200": { "description": "Page of books", "content": { "application/json": { "schema": page } } },
                            "401": { "description": "Missing or invalid credentials", "content": { "application/json": { "schema": error } } }
                        }
                    },
                    "post": {
                        "summary": "List a new book (admin)",
                        "tags": ["Books"],
                        "security": [{ "bearer": [] }],
                        "requestBody": { "content": { "application/json": { "schema": { "$ref": "#/components/schemas/CreateBook" } } } },
                        "responses": {
                            "201": { "description": "Created book", "content": { "application/json": { "schema": book } } },
                            "400": { "description": "Invalid input", "content": { "application/json": { "schema": error } } },
                            "403": { "description": "Administrator role required", "content": { "application/json": { "schema": error } } }
                        }
                    }
                },
                "/me": {
                    "get": {
                        "summary": "Books held by the caller",
                        "tags": ["Books"],
                        "security": [{ "bearer": [] }],
                        "parameters": paging,
                        "responses": {
                            "200": { "description": "Page of books", "content": { "application/json": { "schema": page } } }
                        }
                    }
                },
                "/{id}": {
                    "get": {
                        "summary": "Get a book",
                        "tags": ["Books"],
                        "security": [{ "bearer": [] }],
                        "responses": {
                            "200": { "description": "Book", "content": { "application/json": { "schema": book } } },
                            "404": { "description": "Book not found", "content": { "application/json": { "schema": error } } }
                        }
                    },
                    "patch": {
                        "summary": "Edit a book the caller holds (admin)",
                        "tags": ["Books"],
                        "security": [{ "bearer": [] }],
                        "responses": {
                            "200": { "description": "Updated book", "content": { "application/json": { "schema": book } } },
                            "403": { "description": "Not the holder, or not an administrator", "content": { "application/json": { "schema": error } } },
                            "404": { "description": "Book not found", "content": { "application/json": { "schema": error } } }
                        }
                    },
                    "delete": {
                        "summary": "Remove a book the caller holds (admin)",
                        "tags": ["Books"],
                        "security": [{ "bearer": [] }],
                        "responses": {
                            "200": { "description": "Deleted book", "content": { "application/json": { "schema": book } } },
                            "403": { "description": "Not the holder, or not an administrator", "content": { "application/json": { "schema": error } } },
                            "404": { "description": "Book not found", "content": { "application/json": { "schema": error } } }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string", "description": "Unique identifier for the book" },
                            "name": { "type": "string", "description": "Title of the book" },
                            "photo": { "type": "string", "description": "Cover image URL" },
                            "ownerId": { "type": "string", "description": "User currently holding the book" }
                        },
                        "required": ["id", "name", "photo", "ownerId"]
                    },
                    "CreateBook": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "photo": { "type": "string" }
                        },
                        "required": ["name"]
                    },
                    "BookPage": {
                        "type": "object",
                        "properties": {
                            "data": { "type": "array", "items": book },
                            "meta": {
                                "type": "object",
                                "properties": {
                                    "total": { "type": "integer" },
                                    "page": { "type": "integer" },
                                    "lastPage": { "type": "integer" }
                                }
                            }
                        }
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                CREATE TABLE books (
                    id       TEXT PRIMARY KEY,
                    name     TEXT NOT NULL CHECK (name <> ''),
                    photo    TEXT NOT NULL DEFAULT '',
                    owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE
                );
                CREATE INDEX books_owner_idx ON books(owner_id);
                CREATE INDEX books_name_idx ON books(name);
                "#,
        }]
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "book module stopped");
        Ok(())
    }
}

/// Load a book the caller may edit: it must exist and the caller must hold it.
fn held_by(conn: &Connection, id: &str, caller: &Identity) -> Result<Book, ServiceError> {
    let book = store::find_by_id(conn, id)?
        .ok_or_else(|| ServiceError::NotFound("book not found".to_string()))?;
    if book.owner_id != caller.user_id {
        return Err(ServiceError::Forbidden(
            "only the book's holder may change it".to_string(),
        ));
    }
    Ok(book)
}

async fn list_books(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Params(query): Params<PageQuery>,
) -> Result<Json<Page<Book>>, AppError> {
    let page = state
        .read(move |conn| {
            store::list(
                conn,
                Ownership::NotOwnedBy(&caller.user_id),
                query.search(),
                query.request(),
            )
            .map_err(ServiceError::from)
        })
        .await?;
    Ok(Json(page))
}

async fn list_my_books(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Params(query): Params<PageQuery>,
) -> Result<Json<Page<Book>>, AppError> {
    let page = state
        .read(move |conn| {
            store::list(
                conn,
                Ownership::OwnedBy(&caller.user_id),
                query.search(),
                query.request(),
            )
            .map_err(ServiceError::from)
        })
        .await?;
    Ok(Json(page))
}

async fn get_book(
    State(state): State<AppState>,
    _caller: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Book>, AppError> {
    let book = state
        .read(move |conn| store::find_by_id(conn, &id).map_err(ServiceError::from))
        .await?
        .ok_or_else(|| AppError::not_found("book not found"))?;
    Ok(Json(book))
}

async fn create_book(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Payload(body): Payload<CreateBook>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    require_admin(&caller).map_err(ServiceError::from)?;

    let mut errors = FieldErrors::new();
    let name = errors.required("name", body.name);
    errors.finish("invalid book")?;
    let photo = body.photo.map(|p| p.trim().to_string()).unwrap_or_default();

    let book = state
        .write(move |conn| {
            store::insert(conn, &name, &photo, &caller.user_id).map_err(ServiceError::from)
        })
        .await?;

    tracing::info!(book_id = %book.id, owner_id = %book.owner_id, "book listed");
    Ok((StatusCode::CREATED, Json(book)))
}

async fn update_book(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<String>,
    Payload(mut changes): Payload<UpdateBook>,
) -> Result<Json<Book>, AppError> {
    require_admin(&caller).map_err(ServiceError::from)?;

    if let Some(name) = changes.name.take() {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::invalid_field("name", "required", "invalid book"));
        }
        changes.name = Some(name);
    }

    let book = state
        .write(move |conn| {
            held_by(conn, &id, &caller)?;
            store::update_details(conn, &id, &changes)?
                .ok_or_else(|| ServiceError::NotFound("book not found".to_string()))
        })
        .await?;
    Ok(Json(book))
}

async fn delete_book(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Book>, AppError> {
    require_admin(&caller).map_err(ServiceError::from)?;

    let book = state
        .write(move |conn| {
            held_by(conn, &id, &caller)?;
            store::delete(conn, &id)?
                .ok_or_else(|| ServiceError::NotFound("book not found".to_string()))
        })
        .await?;

    tracing::info!(book_id = %book.id, "book removed");
    Ok(Json(book))
}

/// Create a new instance of the book module
pub fn create_module(state: AppState) -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(BooksModule::new(state))
}
