//! BookSwap application library
//!
//! Account, catalog and trade modules plus the wiring that mounts them on the
//! shared HTTP server.

pub mod app;
pub mod error;
pub mod modules;
pub mod seed;
pub mod state;
pub mod utils;

pub use app::{build_registry, build_router, open_database, run};
pub use state::{AppState, LogOutbox, Outbox};

#[cfg(test)]
pub(crate) mod testing {
    use bookswap_authz::Role;
    use bookswap_db::Database;
    use bookswap_kernel::settings::Settings;

    use crate::modules::users::{models::NewUser, models::User, store};
    use crate::state::AppState;

    /// Fresh in-memory database with every module migration applied.
    pub fn migrated_db() -> Database {
        let db = Database::in_memory().unwrap();
        let state = AppState::new(db.clone(), &Settings::default());
        crate::build_registry(&state).apply_migrations(&db).unwrap();
        db
    }

    /// Insert a plain user named `name` with a placeholder password hash.
    pub fn seed_user(db: &Database, name: &str) -> User {
        db.write(|conn| {
            store::insert(
                conn,
                &NewUser {
                    email: format!("{name}@example.com"),
                    username: name.to_string(),
                    password_hash: "not-a-real-hash".to_string(),
                    role: Role::User,
                    email_verified: false,
                },
            )
        })
        .unwrap()
    }
}
