//! Shared per-process state handed to every module router.

use std::sync::Arc;

use bookswap_authz::TokenSigner;
use bookswap_db::{Database, DbError};
use bookswap_http::AppError;
use bookswap_kernel::settings::{AuthSettings, Settings};
use rusqlite::Connection;

use crate::utils::run_blocking;

/// Outgoing account notices (password reset, email verification).
pub trait Outbox: Send + Sync {
    fn deliver(&self, to: &str, subject: &str, body: &str);
}

/// Writes notices to the log instead of sending mail.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOutbox;

impl Outbox for LogOutbox {
    fn deliver(&self, to: &str, subject: &str, body: &str) {
        tracing::info!(target: "bookswap::outbox", %to, %subject, "notice queued");
        tracing::debug!(target: "bookswap::outbox", %to, %body, "notice body");
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub tokens: TokenSigner,
    pub auth: AuthSettings,
    pub outbox: Arc<dyn Outbox>,
}

impl AppState {
    pub fn new(db: Database, settings: &Settings) -> Self {
        Self {
            db,
            tokens: TokenSigner::new(settings.token_secret()),
            auth: settings.auth.clone(),
            outbox: Arc::new(LogOutbox),
        }
    }

    pub fn with_outbox(mut self, outbox: Arc<dyn Outbox>) -> Self {
        self.outbox = outbox;
        self
    }

    /// Read from the store on the blocking pool.
    pub async fn read<T, E, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Connection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<AppError> + Send + 'static,
    {
        let db = self.db.clone();
        run_blocking(move || db.read(f)).await
    }

    /// Run `f` in a write transaction on the blocking pool.
    pub async fn write<T, E, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Connection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<AppError> + From<DbError> + Send + 'static,
    {
        let db = self.db.clone();
        run_blocking(move || db.write(f)).await
    }
}
