//! Project-specific utilities live here.

pub mod pagination;
pub mod validation;

use bookswap_http::AppError;

pub use pagination::{Page, PageMeta, PageQuery, PageRequest};
pub use validation::FieldErrors;

/// Run blocking store or hashing work off the async runtime.
pub async fn run_blocking<T, E, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| AppError::Internal(anyhow::Error::new(err).context("blocking task failed")))?
        .map_err(Into::into)
}

/// Fresh time-ordered identifier for new records.
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}
