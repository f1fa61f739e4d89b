//! Demo data for local development.

use bookswap_authz::{hash_password, Role};
use bookswap_db::Database;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::ServiceError;
use crate::modules::books::store as books;
use crate::modules::users::{models::NewUser, store as users};

/// Password shared by every seeded account.
pub const SEED_PASSWORD: &str = "12345678";

const TITLES: &[&str] = &[
    "Dune",
    "Emma",
    "Ulysses",
    "Middlemarch",
    "Beloved",
    "Invisible Cities",
    "The Left Hand of Darkness",
    "Moby-Dick",
    "Things Fall Apart",
    "The Master and Margarita",
    "Pedro Páramo",
    "Kindred",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub users: usize,
    pub books: usize,
}

/// Insert `user_count` accounts and `book_count` books spread across them.
/// The first account is an administrator.
pub fn seed(db: &Database, user_count: usize, book_count: usize) -> Result<SeedReport, ServiceError> {
    if user_count == 0 && book_count > 0 {
        return Err(ServiceError::invalid(
            "users",
            "required",
            "books need at least one user to hold them",
        ));
    }

    let password_hash = hash_password(SEED_PASSWORD)?;
    let mut rng = rand::thread_rng();
    // Suffix keeps repeated runs from colliding on unique columns.
    let run: u16 = rng.gen();

    let report = db.write(|conn| {
        let mut owners = Vec::with_capacity(user_count);
        for i in 1..=user_count {
            let user = users::insert(
                conn,
                &NewUser {
                    email: format!("reader{i}-{run:04x}@bookswap.local"),
                    username: format!("reader{i}-{run:04x}"),
                    password_hash: password_hash.clone(),
                    role: if i == 1 { Role::Admin } else { Role::User },
                    email_verified: true,
                },
            )?;
            owners.push(user.id);
        }

        for i in 0..book_count {
            let title = TITLES.choose(&mut rng).copied().unwrap_or("Untitled");
            let owner = &owners[i % owners.len()];
            books::insert(conn, title, "", owner)?;
        }

        Ok::<_, ServiceError>(SeedReport {
            users: user_count,
            books: book_count,
        })
    })?;

    tracing::info!(users = report.users, books = report.books, "seeded demo data");
    Ok(report)
}
