//! SQL access for the `users` table. Every function takes a connection so it
//! can run inside the caller's transaction.

use bookswap_authz::Role;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{NewUser, UpdateUser, User};
use crate::error::ServiceError;
use crate::utils::{new_id, Page, PageRequest};

const COLUMNS: &str = "id, email, username, email_verified, role";

fn from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(4)?;
    let role = role.parse::<Role>().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(err))
    })?;

    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        email_verified: row.get(3)?,
        role,
    })
}

fn taken(err: rusqlite::Error) -> ServiceError {
    if bookswap_db::is_unique_violation(&err) {
        ServiceError::Conflict("email or username already taken".to_string())
    } else {
        err.into()
    }
}

pub fn insert(conn: &Connection, new: &NewUser) -> Result<User, ServiceError> {
    let id = new_id();
    conn.execute(
        "INSERT INTO users (id, email, username, password_hash, email_verified, role)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id,
            new.email,
            new.username,
            new.password_hash,
            new.email_verified,
            new.role.as_str()
        ],
    )
    .map_err(taken)?;

    Ok(User {
        id,
        email: new.email.clone(),
        username: new.username.clone(),
        email_verified: new.email_verified,
        role: new.role,
    })
}

pub fn find_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
        params![id],
        from_row,
    )
    .optional()
}

/// The account and its password hash, for login.
pub fn find_credentials(conn: &Connection, email: &str) -> rusqlite::Result<Option<(User, String)>> {
    conn.query_row(
        &format!("SELECT {COLUMNS}, password_hash FROM users WHERE email = ?1"),
        params![email],
        |row| Ok((from_row(row)?, row.get(5)?)),
    )
    .optional()
}

/// The account and its password hash, for checking a token's credential stamp.
pub fn find_credentials_by_id(
    conn: &Connection,
    id: &str,
) -> rusqlite::Result<Option<(User, String)>> {
    conn.query_row(
        &format!("SELECT {COLUMNS}, password_hash FROM users WHERE id = ?1"),
        params![id],
        |row| Ok((from_row(row)?, row.get(5)?)),
    )
    .optional()
}

pub fn list(conn: &Connection, request: PageRequest) -> rusqlite::Result<Page<User>> {
    let total: u64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM users ORDER BY username ASC LIMIT ?1 OFFSET ?2"
    ))?;
    let users = stmt
        .query_map(params![request.limit, request.offset()], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Page::new(users, total, request))
}

pub fn update(conn: &Connection, id: &str, changes: &UpdateUser) -> Result<Option<User>, ServiceError> {
    let updated = conn
        .execute(
            "UPDATE users SET
                email = COALESCE(?2, email),
                username = COALESCE(?3, username),
                role = COALESCE(?4, role),
                email_verified = COALESCE(?5, email_verified)
             WHERE id = ?1",
            params![
                id,
                changes.email,
                changes.username,
                changes.role.map(|r| r.as_str()),
                changes.email_verified
            ],
        )
        .map_err(taken)?;

    if updated == 0 {
        return Ok(None);
    }
    Ok(find_by_id(conn, id)?)
}

pub fn set_password(conn: &Connection, id: &str, password_hash: &str) -> rusqlite::Result<bool> {
    let updated = conn.execute(
        "UPDATE users SET password_hash = ?2 WHERE id = ?1",
        params![id, password_hash],
    )?;
    Ok(updated == 1)
}

pub fn mark_email_verified(conn: &Connection, id: &str) -> rusqlite::Result<Option<User>> {
    conn.execute("UPDATE users SET email_verified = 1 WHERE id = ?1", params![id])?;
    find_by_id(conn, id)
}

/// Delete the account; its books go with it.
pub fn delete(conn: &Connection, id: &str) -> rusqlite::Result<Option<User>> {
    let Some(user) = find_by_id(conn, id)? else {
        return Ok(None);
    };
    conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    Ok(Some(user))
}

pub fn count(conn: &Connection) -> rusqlite::Result<u64> {
    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
}
