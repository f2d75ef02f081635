//! Fail-open helper for best-effort side effects
//!
//! Memory snapshots and context enrichment must never take a mission down.
//! Collaborator calls that decide the mission outcome (planning, design,
//! execution, review) are NOT fail-open.

use std::future::Future;
use tracing::warn;

use crate::Result;

/// Run an operation whose failure should be logged and ignored
///
/// Logs the error via `tracing::warn!` on failure and returns `None`.
///
/// ```no_run
/// use overmind_core::fail_open::fail_open;
/// use overmind_core::Result;
///
/// async fn capture() -> Result<()> {
///     Ok(())
/// }
///
/// async fn example() {
///     let result = fail_open("memory::capture", || capture()).await;
///     // result is None if capture() failed, otherwise Some(())
/// }
/// ```
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}
