//! API endpoint handlers, one module per resource.
//!
//! Handlers open their own connection, call into the service layer and
//! publish tracker events after a transition commits.

pub mod ambulances;
pub mod auth;
pub mod case_queries;
pub mod directory;
pub mod enquiries;
pub mod health;
pub mod tracker;
pub mod users;

use uuid::Uuid;

use crate::api::error::ApiError;

/// Parse a path segment as an id.
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|e| ApiError::BadRequest(format!("Invalid {what} ID: {e}")))
}

/// Run CPU-heavy work (password hashing) on the blocking pool.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("Blocking task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blocking_work_runs_off_the_async_worker() {
        let caller = std::thread::current().id();
        let worker = blocking(move || Ok(std::thread::current().id())).await.unwrap();
        assert_ne!(worker, caller);
    }

    #[tokio::test]
    async fn blocking_errors_pass_through() {
        let err = blocking(|| Err::<(), _>(ApiError::Unauthorized)).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }
}
