use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::modules::books::models::Book;

/// Lifecycle state of a trade. `Accepted` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeStatus {
    Pending,
    Accepted,
    Rejected,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Pending => "PENDING",
            TradeStatus::Accepted => "ACCEPTED",
            TradeStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TradeStatus::Pending)
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown trade status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for TradeStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TradeStatus::Pending),
            "ACCEPTED" => Ok(TradeStatus::Accepted),
            "REJECTED" => Ok(TradeStatus::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl ToSql for TradeStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TradeStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}

/// A proposed exchange of two books between two users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,
    pub status: TradeStatus,
    /// User who proposed the trade
    pub sender_id: String,
    /// User the proposal is addressed to
    pub receiver_id: String,
    /// Book the sender gives up
    pub sender_book_id: String,
    /// Book the sender asks for
    pub receiver_book_id: String,
}

impl Trade {
    /// Whether `user_id` is the sender or the receiver.
    pub fn involves(&self, user_id: &str) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }
}

/// Body of `POST /trade`. The sender is always the caller.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTrade {
    pub receiver_id: Option<String>,
    pub sender_book_id: Option<String>,
    pub receiver_book_id: Option<String>,
}

/// Body of `PATCH /trade/{id}`. Kept as text so an unknown status is a
/// validation error rather than a malformed body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransitionRequest {
    pub status: Option<String>,
}

/// An accepted trade together with both books after the swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub trade: Trade,
    pub sender_book: Book,
    pub receiver_book: Book,
}

/// Result of a status change: a settlement when accepted, the trade itself
/// when rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TransitionOutcome {
    Settled(Settlement),
    Rejected(Trade),
}

impl TransitionOutcome {
    pub fn trade(&self) -> &Trade {
        match self {
            TransitionOutcome::Settled(settlement) => &settlement.trade,
            TransitionOutcome::Rejected(trade) => trade,
        }
    }
}
