/// Deadline wrapper for collaborator calls
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Debug, Clone, Copy)]
pub struct TimeoutConfig {
    pub duration: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(3),
        }
    }
}

/// Failure of a bounded call: either the deadline passed or the call itself
/// returned an error.
#[derive(Debug, thiserror::Error)]
pub enum CallError<E> {
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Failed(E),
}

/// Execute a fallible future with a deadline
pub async fn call_with_timeout<F, T, E>(duration: Duration, future: F) -> Result<T, CallError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match timeout(duration, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(CallError::Failed(err)),
        Err(_) => Err(CallError::Timeout(duration)),
    }
}
