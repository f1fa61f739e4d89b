//! Trade negotiation and settlement.
//!
//! Every state change runs in one immediate write transaction, so the custody
//! check on acceptance and the ownership swap that follows act as a single
//! compare-and-swap against concurrent settlements.

use bookswap_authz::Identity;
use bookswap_db::{Database, DbError};
use bookswap_http::AppError;
use rusqlite::Connection;
use serde_json::json;
use thiserror::Error;

use super::models::{CreateTrade, Settlement, Trade, TradeStatus, TransitionOutcome};
use super::store;
use crate::modules::books::store as books;
use crate::utils::FieldErrors;

#[derive(Debug, Error)]
pub enum TradeError {
    #[error("{message}")]
    Validation {
        details: Vec<serde_json::Value>,
        message: String,
    },

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("trade not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] DbError),
}

impl TradeError {
    fn invalid(field: &str, error: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            details: vec![json!({ "field": field, "error": error })],
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for TradeError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(DbError::from(err))
    }
}

impl From<TradeError> for AppError {
    fn from(err: TradeError) -> Self {
        match err {
            TradeError::Validation { details, message } => AppError::validation(details, message),
            TradeError::Forbidden(message) => AppError::forbidden(message),
            TradeError::NotFound => AppError::not_found("trade not found"),
            TradeError::Conflict(message) => AppError::conflict(Vec::new(), message),
            TradeError::Store(err) => AppError::Internal(err.into()),
        }
    }
}

/// Creates, lists and settles trades against the shared store.
#[derive(Clone)]
pub struct TradeLedger {
    db: Database,
}

impl TradeLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Propose a trade from `sender`. Book custody is not checked until the
    /// receiver accepts.
    pub fn create(&self, sender: &Identity, request: CreateTrade) -> Result<Trade, TradeError> {
        let mut errors = FieldErrors::new();
        let receiver_id = errors.required("receiverId", request.receiver_id);
        let sender_book_id = errors.required("senderBookId", request.sender_book_id);
        let receiver_book_id = errors.required("receiverBookId", request.receiver_book_id);
        if !receiver_id.is_empty() {
            errors.ensure(receiver_id != sender.user_id, "receiverId", "same_as_sender");
        }
        if !sender_book_id.is_empty() {
            errors.ensure(
                sender_book_id != receiver_book_id,
                "receiverBookId",
                "same_as_sender_book",
            );
        }
        errors.check().map_err(|details| TradeError::Validation {
            details,
            message: "invalid trade".to_string(),
        })?;

        let trade = self.db.write(|conn| {
            store::insert(
                conn,
                &sender.user_id,
                &receiver_id,
                &sender_book_id,
                &receiver_book_id,
            )
            .map_err(TradeError::from)
        })?;

        tracing::info!(
            trade_id = %trade.id,
            sender_id = %trade.sender_id,
            receiver_id = %trade.receiver_id,
            "trade proposed"
        );
        Ok(trade)
    }

    /// Every trade `user_id` sent or received, in creation order.
    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<Trade>, TradeError> {
        self.db
            .read(|conn| store::list_for_user(conn, user_id).map_err(TradeError::from))
    }

    /// Apply `requested` to a pending trade on behalf of `requester`.
    ///
    /// Accepting is reserved to the receiver and swaps the two books; either
    /// party may reject. Terminal trades refuse every further change.
    pub fn transition(
        &self,
        trade_id: &str,
        requester: &Identity,
        requested: &str,
    ) -> Result<TransitionOutcome, TradeError> {
        let outcome = self.db.write(|conn| -> Result<TransitionOutcome, TradeError> {
            let trade = store::find_by_id(conn, trade_id)?.ok_or(TradeError::NotFound)?;

            let requested = match requested.parse::<TradeStatus>() {
                Ok(status) if status.is_terminal() => status,
                _ => {
                    return Err(TradeError::invalid(
                        "status",
                        "invalid",
                        "status must be ACCEPTED or REJECTED",
                    ))
                }
            };

            if !trade.involves(&requester.user_id) {
                return Err(TradeError::Forbidden("not a party to this trade"));
            }
            if trade.status.is_terminal() {
                return Err(TradeError::Conflict(format!(
                    "trade is already {}",
                    trade.status
                )));
            }

            match requested {
                TradeStatus::Accepted => {
                    if requester.user_id != trade.receiver_id {
                        return Err(TradeError::Forbidden("only the receiver can accept a trade"));
                    }
                    settle(conn, trade).map(TransitionOutcome::Settled)
                }
                _ => {
                    close(conn, &trade, TradeStatus::Rejected)?;
                    Ok(TransitionOutcome::Rejected(Trade {
                        status: TradeStatus::Rejected,
                        ..trade
                    }))
                }
            }
        })?;

        tracing::info!(
            trade_id = %outcome.trade().id,
            status = %outcome.trade().status,
            requester_id = %requester.user_id,
            "trade closed"
        );
        Ok(outcome)
    }
}

fn close(conn: &Connection, trade: &Trade, status: TradeStatus) -> Result<(), TradeError> {
    if store::close(conn, &trade.id, status)? {
        Ok(())
    } else {
        Err(TradeError::Conflict("trade is no longer pending".to_string()))
    }
}

/// Swap both books between the parties and mark the trade accepted.
fn settle(conn: &Connection, trade: Trade) -> Result<Settlement, TradeError> {
    let missing = |field: &str| TradeError::invalid(field, "not_found", "book no longer exists");
    let sender_book =
        books::find_by_id(conn, &trade.sender_book_id)?.ok_or_else(|| missing("senderBookId"))?;
    let receiver_book = books::find_by_id(conn, &trade.receiver_book_id)?
        .ok_or_else(|| missing("receiverBookId"))?;

    if sender_book.owner_id != trade.sender_id || receiver_book.owner_id != trade.receiver_id {
        tracing::warn!(
            trade_id = %trade.id,
            sender_book_owner = %sender_book.owner_id,
            receiver_book_owner = %receiver_book.owner_id,
            "settlement refused on stale custody"
        );
        return Err(TradeError::Conflict("books already changed owner".to_string()));
    }

    let sender_book = books::update_owner(conn, &sender_book.id, &trade.receiver_id)?;
    let receiver_book = books::update_owner(conn, &receiver_book.id, &trade.sender_id)?;
    close(conn, &trade, TradeStatus::Accepted)?;

    Ok(Settlement {
        trade: Trade {
            status: TradeStatus::Accepted,
            ..trade
        },
        sender_book,
        receiver_book,
    })
}
