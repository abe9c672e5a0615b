/// Supervised restart of long-running tasks
///
/// A supervised task is expected to run until shutdown. When it returns an
/// error the supervisor waits according to an exponential backoff and starts it
/// again. Failures are counted inside a sliding window: once more than
/// `max_restarts` failures land inside `window`, the supervisor gives up and
/// hands the last error back to the caller so the process can exit loudly.
use crate::retry::{Backoff, RetryConfig};
use std::collections::VecDeque;
use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Failures tolerated inside `window` before giving up
    pub max_restarts: u32,
    /// Sliding window used to count failures
    pub window: Duration,
    /// Delay schedule between restarts
    pub backoff: RetryConfig,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_restarts: 5,
            window: Duration::from_secs(300),
            backoff: RetryConfig {
                max_retries: u32::MAX,
                initial_backoff: Duration::from_secs(1),
                max_backoff: Duration::from_secs(60),
                backoff_multiplier: 2.0,
                jitter: true,
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError<E> {
    #[error("restart budget exhausted after {failures} failures within {window:?}: {last_error}")]
    RestartBudgetExhausted {
        failures: u32,
        window: Duration,
        last_error: E,
    },
}

pub struct Supervisor {
    name: String,
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(name: impl Into<String>, config: SupervisorConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    /// Run `task` until it exits cleanly, shutdown is requested while backing
    /// off, or the restart budget is exhausted.
    pub async fn run<F, Fut, E>(
        &self,
        mut shutdown: watch::Receiver<bool>,
        mut task: F,
    ) -> Result<(), SupervisorError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let mut failures: VecDeque<Instant> = VecDeque::new();
        let mut backoff = Backoff::new(self.config.backoff.clone());

        loop {
            let started = Instant::now();

            let err = match task().await {
                Ok(()) => {
                    info!(task = %self.name, "Supervised task exited cleanly");
                    return Ok(());
                }
                Err(err) => err,
            };

            let now = Instant::now();
            failures.push_back(now);
            while let Some(first) = failures.front() {
                if now.duration_since(*first) > self.config.window {
                    failures.pop_front();
                } else {
                    break;
                }
            }

            // A run that stayed up for a whole window starts the schedule over
            if now.duration_since(started) >= self.config.window {
                backoff.reset();
            }

            let failure_count = failures.len() as u32;
            if failure_count > self.config.max_restarts {
                error!(
                    task = %self.name,
                    failures = failure_count,
                    window_secs = self.config.window.as_secs(),
                    error = %err,
                    "Restart budget exhausted, giving up"
                );
                return Err(SupervisorError::RestartBudgetExhausted {
                    failures: failure_count,
                    window: self.config.window,
                    last_error: err,
                });
            }

            let delay = backoff.next_delay();
            warn!(
                task = %self.name,
                failures = failure_count,
                max_restarts = self.config.max_restarts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Supervised task failed, restarting after backoff"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = wait_for_shutdown(&mut shutdown) => {
                    info!(task = %self.name, "Shutdown requested during backoff");
                    return Ok(());
                }
            }
        }
    }
}

/// Resolve once the shutdown flag is set.
///
/// A dropped sender means no shutdown can ever be signalled, so the future
/// stays pending instead of resolving.
pub async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_for_shutdown_returns_when_already_set() {
        let (_tx, mut rx) = watch::channel(true);
        tokio::time::timeout(Duration::from_millis(100), wait_for_shutdown(&mut rx))
            .await
            .expect("should resolve immediately");
    }

    #[tokio::test]
    async fn test_wait_for_shutdown_pending_when_sender_dropped() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let result =
            tokio::time::timeout(Duration::from_millis(50), wait_for_shutdown(&mut rx)).await;
        assert!(result.is_err());
    }
}
