//! Configuration, logging and small async helpers shared by every stage.

/// Structured logging setup and operation timing.
pub mod logging;
/// TOML configuration (`research.toml`).
pub mod toml_config;

use crate::types::{AppError, Result};
use std::future::Future;
use std::time::Duration;

/// Await `fut` for at most `limit`, mapping expiry to [`AppError::Timeout`].
pub async fn with_timeout<T, F>(operation: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout {
            operation: operation.to_string(),
            secs: limit.as_secs(),
        }),
    }
}
