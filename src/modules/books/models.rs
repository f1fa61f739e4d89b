use serde::{Deserialize, Serialize};

/// A book listed for exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Unique identifier for the book
    pub id: String,
    /// Title shown in listings
    pub name: String,
    /// Cover image URL
    pub photo: String,
    /// User currently holding the book
    pub owner_id: String,
}

/// Request model for listing a new book.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBook {
    pub name: Option<String>,
    pub photo: Option<String>,
}

/// Request model for editing a listing. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBook {
    pub name: Option<String>,
    pub photo: Option<String>,
}

/// Whose books a listing query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership<'a> {
    /// Books held by this user
    OwnedBy(&'a str),
    /// Books held by anyone else
    NotOwnedBy(&'a str),
}
