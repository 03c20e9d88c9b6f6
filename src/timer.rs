//! Optional single-shot deadlines for `select!` loops.

use tokio::time::Instant;

/// Sleep until `deadline`, or forever when there is none.
pub async fn sleep_until_or_pending(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
