//! Panic recovery for user callbacks run inside a worker loop.
//!
//! A panicking periodic task or queue handler must not take the whole
//! loop down with it. Running the callback inside its own `tokio::spawn`
//! lets the runtime catch the unwind; we surface it as a log line and a
//! `None` result rather than propagating the panic.

use std::future::Future;

use tracing::error;

/// Run `fut` to completion, catching a panic if one occurs.
///
/// Returns `Some(output)` on normal completion, `None` if the task
/// panicked or was cancelled.
pub async fn run_guarded<Fut>(fut: Fut) -> Option<Fut::Output>
where
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    match tokio::spawn(fut).await {
        Ok(output) => Some(output),
        Err(join_err) if join_err.is_panic() => {
            error!("worker task panicked; recovered");
            None
        }
        Err(_join_err) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recovers_from_panic() {
        let result = run_guarded(async { panic!("boom") }).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn passes_through_output() {
        let result = run_guarded(async { 42 }).await;
        assert_eq!(result, Some(42));
    }
}
