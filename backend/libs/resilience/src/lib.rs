/// Resilience helpers shared by the feed pipeline
///
/// - **Timeout**: every call to Redis, gRPC collaborators and the broker is
///   bounded; elapsing is reported as a failure of that call, never success.
/// - **Backoff**: exponential delay with jitter applied before an
///   unacknowledged message is handed back to the broker for redelivery.
/// - **Presets**: default deadlines per collaborator type.
///
/// # Example: bounded store call
///
/// ```rust,no_run
/// use resilience::{presets, timeout::call_with_timeout};
///
/// # async fn example() {
/// let result = call_with_timeout(presets::timeline_store().duration, async {
///     // Redis LPUSH here
///     Ok::<_, String>(())
/// })
/// .await;
/// # }
/// ```
pub mod backoff;
pub mod presets;
pub mod timeout;

pub use backoff::RedeliveryBackoff;
pub use timeout::{call_with_timeout, CallError, TimeoutConfig};
