/// Integration tests for resilience library
use resilience::{
    retry::RetryConfig,
    supervisor::{Supervisor, SupervisorConfig, SupervisorError},
    timeout::with_timeout,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

fn fast_supervisor(max_restarts: u32) -> SupervisorConfig {
    SupervisorConfig {
        max_restarts,
        window: Duration::from_secs(60),
        backoff: RetryConfig {
            max_retries: u32::MAX,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(20),
            backoff_multiplier: 2.0,
            jitter: false,
        },
    }
}

// ==================== Supervisor Tests ====================

#[tokio::test]
async fn test_supervisor_restarts_until_clean_exit() {
    let (_tx, rx) = watch::channel(false);
    let supervisor = Supervisor::new("test", fast_supervisor(5));
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();

    let result = supervisor
        .run(rx, move || {
            let call = calls_clone.fetch_add(1, Ordering::SeqCst);
            async move {
                if call < 2 {
                    Err("queue unreachable".to_string())
                } else {
                    Ok(())
                }
            }
        })
        .await;

    assert!(result.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_supervisor_gives_up_after_restart_budget() {
    let (_tx, rx) = watch::channel(false);
    let supervisor = Supervisor::new("test", fast_supervisor(2));
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();

    let result = supervisor
        .run(rx, move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("queue unreachable".to_string()) }
        })
        .await;

    match result {
        Err(SupervisorError::RestartBudgetExhausted {
            failures,
            last_error,
            ..
        }) => {
            assert_eq!(failures, 3);
            assert_eq!(last_error, "queue unreachable");
        }
        Ok(()) => panic!("supervisor should have given up"),
    }
    // Initial run + 2 restarts
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_supervisor_backs_off_between_restarts() {
    let (_tx, rx) = watch::channel(false);
    let supervisor = Supervisor::new("test", fast_supervisor(3));

    let start = Instant::now();
    let _ = supervisor
        .run(rx, || async { Err::<(), _>("down") })
        .await;

    // Expected: 5ms + 10ms + 20ms between the four runs
    assert!(start.elapsed() >= Duration::from_millis(35));
}

#[tokio::test]
async fn test_supervisor_shutdown_interrupts_backoff() {
    let (tx, rx) = watch::channel(false);
    let mut config = fast_supervisor(10);
    config.backoff.initial_backoff = Duration::from_secs(30);
    config.backoff.max_backoff = Duration::from_secs(30);
    let supervisor = Supervisor::new("test", config);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = tx.send(true);
    });

    let start = Instant::now();
    let result = supervisor
        .run(rx, || async { Err::<(), _>("down") })
        .await;

    assert!(result.is_ok());
    assert!(start.elapsed() < Duration::from_secs(5));
}

// ==================== Timeout Tests ====================

#[tokio::test]
async fn test_timeout_wraps_slow_call() {
    let result = with_timeout(Duration::from_millis(20), async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok::<_, String>(())
    })
    .await;

    assert!(result.is_err());
}
