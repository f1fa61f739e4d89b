//! SQL access for the `trades` table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{Trade, TradeStatus};
use crate::utils::new_id;

const COLUMNS: &str = "id, status, sender_id, receiver_id, sender_book_id, receiver_book_id";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Trade> {
    Ok(Trade {
        id: row.get(0)?,
        status: row.get(1)?,
        sender_id: row.get(2)?,
        receiver_id: row.get(3)?,
        sender_book_id: row.get(4)?,
        receiver_book_id: row.get(5)?,
    })
}

/// Record a new pending trade.
pub fn insert(
    conn: &Connection,
    sender_id: &str,
    receiver_id: &str,
    sender_book_id: &str,
    receiver_book_id: &str,
) -> rusqlite::Result<Trade> {
    let trade = Trade {
        id: new_id(),
        status: TradeStatus::Pending,
        sender_id: sender_id.to_string(),
        receiver_id: receiver_id.to_string(),
        sender_book_id: sender_book_id.to_string(),
        receiver_book_id: receiver_book_id.to_string(),
    };
    conn.execute(
        &format!("INSERT INTO trades ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
        params![
            trade.id,
            trade.status,
            trade.sender_id,
            trade.receiver_id,
            trade.sender_book_id,
            trade.receiver_book_id
        ],
    )?;
    Ok(trade)
}

pub fn find_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<Trade>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM trades WHERE id = ?1"),
        params![id],
        from_row,
    )
    .optional()
}

/// Every trade the user sent or received, oldest first.
pub fn list_for_user(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<Trade>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM trades
         WHERE sender_id = ?1 OR receiver_id = ?1
         ORDER BY id ASC"
    ))?;
    let trades = stmt
        .query_map(params![user_id], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(trades)
}

/// Move a pending trade to `status`. Returns `false` when the trade is no
/// longer pending.
pub fn close(conn: &Connection, id: &str, status: TradeStatus) -> rusqlite::Result<bool> {
    let updated = conn.execute(
        "UPDATE trades SET status = ?2 WHERE id = ?1 AND status = 'PENDING'",
        params![id, status],
    )?;
    Ok(updated == 1)
}
