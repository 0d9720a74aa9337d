use std::time::Duration;

use tokio::time::Instant;

use crate::error::OrchestratorError;

/// Evaluate `ready` every `interval` until it returns true.
///
/// Fails with [`OrchestratorError::Timeout`] once `timeout` has elapsed
/// without the predicate holding. The predicate is checked once more at
/// the deadline.
pub async fn poll_until<F>(
    what: &str,
    interval: Duration,
    timeout: Duration,
    mut ready: F,
) -> Result<(), OrchestratorError>
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if ready() {
            return Ok(());
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(OrchestratorError::timeout(what, timeout));
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn returns_once_predicate_holds() {
        let calls = AtomicU32::new(0);
        poll_until("three calls", Duration::from_millis(1), Duration::from_secs(5), || {
            calls.fetch_add(1, Ordering::SeqCst) >= 2
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn times_out() {
        let err = poll_until("never", Duration::from_millis(5), Duration::from_millis(20), || false)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Timeout { .. }));
        assert!(err.to_string().contains("never"));
    }
}
