/// Resilience patterns for long-running workers
///
/// This library provides the recovery primitives shared by the thumbnail
/// pipeline binaries:
/// - **Retry**: Exponential backoff with jitter for transient failures
/// - **Timeout**: Time limits on external calls
/// - **Supervisor**: Restart a failing long-running task with backoff and a
///   bounded restart budget, instead of crash-looping the process
///
/// # Example: Supervised worker loop
///
/// ```rust,no_run
/// use resilience::{Supervisor, SupervisorConfig};
/// use tokio::sync::watch;
///
/// #[tokio::main]
/// async fn main() {
///     let (_tx, rx) = watch::channel(false);
///     let supervisor = Supervisor::new("worker", SupervisorConfig::default());
///
///     let result = supervisor
///         .run(rx, || async {
///             // Your long-running loop here
///             Ok::<_, String>(())
///         })
///         .await;
///     assert!(result.is_ok());
/// }
/// ```
///
/// # Example: Storage call with timeout
///
/// ```rust,no_run
/// use resilience::timeout::with_timeout;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let result = with_timeout(Duration::from_secs(30), async {
///         // Your storage call
///         42
///     })
///     .await;
/// }
/// ```

pub mod retry;
pub mod supervisor;
pub mod timeout;

// Re-export main types for convenience
pub use retry::{with_retry, Backoff, RetryConfig, RetryError};
pub use supervisor::{wait_for_shutdown, Supervisor, SupervisorConfig, SupervisorError};
pub use timeout::{with_timeout, TimeoutError};
