//! Rate-limit gate behavior over the in-memory store

use morph_core::{Error, RateLimitConfig, RateLimiter};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_three_attempts_then_limited_until_reset() {
    let limiter = RateLimiter::in_memory(RateLimitConfig::new(3, Duration::from_secs(60)));

    for _ in 0..3 {
        limiter.check("tenant-1").await.unwrap();
    }

    match limiter.check("tenant-1").await {
        Err(Error::RateLimited {
            key,
            max_attempts,
            retry_after_secs,
        }) => {
            assert!(key.ends_with("tenant-1"));
            assert_eq!(max_attempts, 3);
            assert!(retry_after_secs > 0);
        }
        other => panic!("expected rate limit, got {:?}", other),
    }

    limiter.reset("tenant-1").await.unwrap();
    limiter.check("tenant-1").await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_window_expiry_restores_quota() {
    let limiter = RateLimiter::in_memory(RateLimitConfig::new(1, Duration::from_secs(10)));
    limiter.check_global().await.unwrap();
    assert!(limiter.check_global().await.is_err());

    tokio::time::advance(Duration::from_secs(11)).await;
    limiter.check_global().await.unwrap();
}

#[tokio::test]
async fn test_status_is_read_only() {
    let limiter = RateLimiter::in_memory(RateLimitConfig::new(2, Duration::from_secs(60)));
    limiter.check("k").await.unwrap();

    for _ in 0..5 {
        let status = limiter.status("k").await.unwrap();
        assert_eq!(status.attempts, 1);
        assert_eq!(status.remaining, 1);
        assert!(!status.limited);
    }
    assert_eq!(limiter.remaining("k").await.unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_checks_never_over_admit() {
    let limiter = Arc::new(RateLimiter::in_memory(RateLimitConfig::new(10, Duration::from_secs(60))));

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.check("shared").await.is_ok() })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 10);
}

#[tokio::test]
async fn test_disabled_limiter_admits_everything() {
    let limiter = RateLimiter::in_memory(RateLimitConfig::disabled());
    for _ in 0..1000 {
        limiter.check_global().await.unwrap();
    }
    assert!(!limiter.global_status().await.unwrap().limited);
}
