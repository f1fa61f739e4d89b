pub mod ledger;
pub mod models;
pub mod store;

use async_trait::async_trait;
use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use bookswap_http::{AppError, Payload};
use bookswap_kernel::{InitCtx, Migration, Module};
use serde_json::json;

use crate::modules::auth::session::CurrentUser;
use crate::state::AppState;
use crate::utils::run_blocking;
pub use ledger::{TradeError, TradeLedger};
use models::{CreateTrade, Trade, TransitionOutcome, TransitionRequest};

/// Router state: the shared app state for authentication plus the ledger.
#[derive(Clone, FromRef)]
struct TradeState {
    app: AppState,
    ledger: TradeLedger,
}

/// Peer-to-peer book trades
pub struct TradesModule {
    state: TradeState,
}

impl TradesModule {
    pub fn new(state: AppState) -> Self {
        let ledger = TradeLedger::new(state.db.clone());
        Self {
            state: TradeState { app: state, ledger },
        }
    }
}

#[async_trait]
impl Module for TradesModule {
    fn name(&self) -> &'static str {
        "trade"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let pending: u64 = ctx.db.read(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM trades WHERE status = 'PENDING'",
                [],
                |row| row.get(0),
            )
        })?;
        tracing::info!(module = self.name(), pending, "trade module initialized");
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", post(create_trade))
            .route("/me", get(list_my_trades))
            .route("/me/", get(list_my_trades))
            .route("/{id}", patch(transition_trade))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = json!({ "$ref": "#/components/schemas/ErrorResponse" });
        let trade = json!({ "$ref": "#/components/schemas/Trade" });
        Some(json!({
            "paths": {
                "/": {
                    "post": {
                        "summary": "Propose a trade",
                        "tags": ["Trades"],
                        "security": [{ "bearer": [] }],
                        "requestBody": { "content": { "application/json": { "schema": { "$ref": "#/components/schemas/CreateTrade" } } } },
                        "responses": {
                            "201": { "description": "Pending trade", "content": { "application/json": { "schema": trade } } },
                            "400": { "description": "Invalid input", "content": { "application/json": { "schema": error } } },
                            "401": { "description": "Missing or invalid credentials", "content": { "application/json": { "schema": error } } }
                        }
                    }
                },
                "/me": {
                    "get": {
                        "summary": "Trades the caller sent or received",
                        "tags": ["Trades"],
                        "security": [{ "bearer": [] }],
                        "responses": {
                            "200": { "description": "Trades in creation order", "content": { "application/json": { "schema": { "type": "array", "items": trade } } } }
                        }
                    }
                },
                "/{id}": {
                    "patch": {
                        "summary": "Accept or reject a pending trade",
                        "tags": ["Trades"],
                        "security": [{ "bearer": [] }],
                        "parameters": [
                            { "name": "id", "in": "path", "required": true, "schema": { "type": "string" } }
                        ],
                        "requestBody": { "content": { "application/json": { "schema": {
                            "type": "object",
                            "properties": { "status": { "type": "string", "enum": ["ACCEPTED", "REJECTED"] } },
                            "required": ["status"]
                        } } } },
                        "responses": {
                            "200": { "description": "Rejected trade, or the settlement of an accepted one", "content": { "application/json": { "schema": { "oneOf": [trade, { "$ref": "#/components/schemas/Settlement" }] } } } },
                            "400": { "description": "Unknown status or missing book", "content": { "application/json": { "schema": error } } },
                            "403": { "description": "Not a party, or not the receiver when accepting", "content": { "application/json": { "schema": error } } },
                            "404": { "description": "Trade not found", "content": { "application/json": { "schema": error } } },
                            "409": { "description": "Trade already closed, or books changed owner", "content": { "application/json": { "schema": error } } }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Trade": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "status": { "type": "string", "enum": ["PENDING", "ACCEPTED", "REJECTED"] },
                            "senderId": { "type": "string" },
                            "receiverId": { "type": "string" },
                            "senderBookId": { "type": "string" },
                            "receiverBookId": { "type": "string" }
                        },
                        "required": ["id", "status", "senderId", "receiverId", "senderBookId", "receiverBookId"]
                    },
                    "CreateTrade": {
                        "type": "object",
                        "properties": {
                            "receiverId": { "type": "string" },
                            "senderBookId": { "type": "string" },
                            "receiverBookId": { "type": "string" }
                        },
                        "required": ["receiverId", "senderBookId", "receiverBookId"]
                    },
                    "Settlement": {
                        "type": "object",
                        "properties": {
                            "trade": trade,
                            "senderBook": { "$ref": "#/components/schemas/Book" },
                            "receiverBook": { "$ref": "#/components/schemas/Book" }
                        },
                        "required": ["trade", "senderBook", "receiverBook"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                CREATE TABLE trades (
                    id               TEXT PRIMARY KEY,
                    status           TEXT NOT NULL DEFAULT 'PENDING'
                                     CHECK (status IN ('PENDING', 'ACCEPTED', 'REJECTED')),
                    sender_id        TEXT NOT NULL,
                    receiver_id      TEXT NOT NULL,
                    sender_book_id   TEXT NOT NULL,
                    receiver_book_id TEXT NOT NULL,
                    CHECK (sender_id <> receiver_id),
                    CHECK (sender_book_id <> receiver_book_id)
                );
                CREATE INDEX trades_sender_idx ON trades(sender_id);
                CREATE INDEX trades_receiver_idx ON trades(receiver_id);

                CREATE TRIGGER trades_terminal_status
                BEFORE UPDATE ON trades
                WHEN OLD.status <> 'PENDING'
                BEGIN
                    SELECT RAISE(ABORT, 'trade is already closed');
                END;

                CREATE TRIGGER trades_fixed_terms
                BEFORE UPDATE OF sender_id, receiver_id, sender_book_id, receiver_book_id ON trades
                BEGIN
                    SELECT RAISE(ABORT, 'trade terms are immutable');
                END;

                CREATE TRIGGER trades_append_only
                BEFORE DELETE ON trades
                BEGIN
                    SELECT RAISE(ABORT, 'trades are never deleted');
                END;
                "#,
        }]
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "trade module stopped");
        Ok(())
    }
}

async fn create_trade(
    State(ledger): State<TradeLedger>,
    CurrentUser(caller): CurrentUser,
    Payload(body): Payload<CreateTrade>,
) -> Result<(StatusCode, Json<Trade>), AppError> {
    let trade = run_blocking(move || ledger.create(&caller, body)).await?;
    Ok((StatusCode::CREATED, Json(trade)))
}

async fn list_my_trades(
    State(ledger): State<TradeLedger>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<Vec<Trade>>, AppError> {
    let trades = run_blocking(move || ledger.list_for_user(&caller.user_id)).await?;
    Ok(Json(trades))
}

async fn transition_trade(
    State(ledger): State<TradeLedger>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<String>,
    Payload(body): Payload<TransitionRequest>,
) -> Result<Json<TransitionOutcome>, AppError> {
    let requested = body.status.unwrap_or_default();
    let outcome = run_blocking(move || ledger.transition(&id, &caller, requested.trim())).await?;
    Ok(Json(outcome))
}

/// Create a new instance of the trade module
pub fn create_module(state: AppState) -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(TradesModule::new(state))
}
