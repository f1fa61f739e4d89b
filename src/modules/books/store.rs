//! Book catalog persistence. Functions take a connection so settlement can
//! run them inside its own transaction.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{Book, Ownership, UpdateBook};
use crate::utils::{new_id, Page, PageRequest};

const COLUMNS: &str = "id, name, photo, owner_id";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        name: row.get(1)?,
        photo: row.get(2)?,
        owner_id: row.get(3)?,
    })
}

/// Escape `%`, `_` and `\` so a search term matches literally. The term is
/// folded the same way `casefold(name)` folds the column.
fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub fn find_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<Book>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM books WHERE id = ?1"),
        params![id],
        from_row,
    )
    .optional()
}

/// Hand the book to `owner_id`, returning the updated row.
pub fn update_owner(conn: &Connection, id: &str, owner_id: &str) -> rusqlite::Result<Book> {
    conn.query_row(
        &format!("UPDATE books SET owner_id = ?2 WHERE id = ?1 RETURNING {COLUMNS}"),
        params![id, owner_id],
        from_row,
    )
}

pub fn insert(conn: &Connection, name: &str, photo: &str, owner_id: &str) -> rusqlite::Result<Book> {
    let book = Book {
        id: new_id(),
        name: name.to_string(),
        photo: photo.to_string(),
        owner_id: owner_id.to_string(),
    };
    conn.execute(
        "INSERT INTO books (id, name, photo, owner_id) VALUES (?1, ?2, ?3, ?4)",
        params![book.id, book.name, book.photo, book.owner_id],
    )?;
    Ok(book)
}

/// Page through books by name, filtered by ownership and a case-insensitive
/// name search.
pub fn list(
    conn: &Connection,
    ownership: Ownership<'_>,
    search: &str,
    request: PageRequest,
) -> rusqlite::Result<Page<Book>> {
    let (owner_clause, owner_id) = match ownership {
        Ownership::OwnedBy(id) => ("owner_id = ?1", id),
        Ownership::NotOwnedBy(id) => ("owner_id <> ?1", id),
    };
    let filter = format!("WHERE {owner_clause} AND casefold(name) LIKE ?2 ESCAPE '\\'");
    let pattern = like_pattern(search);

    let total: u64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM books {filter}"),
        params![owner_id, pattern],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM books {filter} ORDER BY name ASC, id ASC LIMIT ?3 OFFSET ?4"
    ))?;
    let books = stmt
        .query_map(
            params![owner_id, pattern, request.limit, request.offset()],
            from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Page::new(books, total, request))
}

pub fn update_details(conn: &Connection, id: &str, changes: &UpdateBook) -> rusqlite::Result<Option<Book>> {
    conn.query_row(
        &format!(
            "UPDATE books SET name = COALESCE(?2, name), photo = COALESCE(?3, photo)
             WHERE id = ?1 RETURNING {COLUMNS}"
        ),
        params![id, changes.name, changes.photo],
        from_row,
    )
    .optional()
}

pub fn delete(conn: &Connection, id: &str) -> rusqlite::Result<Option<Book>> {
    conn.query_row(
        &format!("DELETE FROM books WHERE id = ?1 RETURNING {COLUMNS}"),
        params![id],
        from_row,
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{migrated_db, seed_user};

    #[test]
    fn owner_update_returns_new_holder() {
        let db = migrated_db();
        let alice = seed_user(&db, "alice");
        let bob = seed_user(&db, "bob");

        db.read(|conn| {
            let book = insert(conn, "Dune", "", &alice.id)?;
            let moved = update_owner(conn, &book.id, &bob.id)?;
            assert_eq!(moved.owner_id, bob.id);
            assert_eq!(find_by_id(conn, &book.id)?.unwrap().owner_id, bob.id);
            Ok::<_, rusqlite::Error>(())
        })
        .unwrap();
    }

    #[test]
    fn update_owner_of_missing_book_fails() {
        let db = migrated_db();
        let alice = seed_user(&db, "alice");
        let err = db
            .read(|conn| update_owner(conn, "missing", &alice.id))
            .unwrap_err();
        assert!(matches!(err, rusqlite::Error::QueryReturnedNoRows));
    }

    #[test]
    fn listing_filters_by_owner_and_search() {
        let db = migrated_db();
        let alice = seed_user(&db, "alice");
        let bob = seed_user(&db, "bob");

        db.read(|conn| {
            insert(conn, "Dune", "", &alice.id)?;
            insert(conn, "Dune Messiah", "", &bob.id)?;
            insert(conn, "Emma", "", &bob.id)?;
            insert(conn, "100% Rust", "", &bob.id)?;

            let others = list(conn, Ownership::NotOwnedBy(&alice.id), "", PageRequest::default())?;
            let names: Vec<_> = others.data.iter().map(|b| b.name.as_str()).collect();
            assert_eq!(names, ["100% Rust", "Dune Messiah", "Emma"]);

            let mine = list(conn, Ownership::OwnedBy(&bob.id), "dUNE", PageRequest::default())?;
            assert_eq!(mine.meta.total, 1);
            assert_eq!(mine.data[0].name, "Dune Messiah");

            let literal = list(conn, Ownership::OwnedBy(&bob.id), "%", PageRequest::default())?;
            assert_eq!(literal.meta.total, 1);
            Ok::<_, rusqlite::Error>(())
        })
        .unwrap();
    }

    #[test]
    fn search_folds_accented_capitals() {
        let db = migrated_db();
        let alice = seed_user(&db, "alice");
        let bob = seed_user(&db, "bob");

        db.read(|conn| {
            insert(conn, "Émile", "", &bob.id)?;
            insert(conn, "Ärger im Paradies", "", &bob.id)?;

            let lower = list(conn, Ownership::NotOwnedBy(&alice.id), "émile", PageRequest::default())?;
            assert_eq!(lower.meta.total, 1);
            assert_eq!(lower.data[0].name, "Émile");

            let upper = list(conn, Ownership::NotOwnedBy(&alice.id), "ÄRGER", PageRequest::default())?;
            assert_eq!(upper.meta.total, 1);
            Ok::<_, rusqlite::Error>(())
        })
        .unwrap();
    }

    #[test]
    fn deleting_owner_removes_books() {
        let db = migrated_db();
        let alice = seed_user(&db, "alice");

        db.read(|conn| {
            let book = insert(conn, "Dune", "", &alice.id)?;
            conn.execute("DELETE FROM users WHERE id = ?1", params![alice.id])?;
            assert!(find_by_id(conn, &book.id)?.is_none());
            Ok::<_, rusqlite::Error>(())
        })
        .unwrap();
    }
}
