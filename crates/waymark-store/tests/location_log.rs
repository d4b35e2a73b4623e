//! Integration tests for the in-memory location log.

use waymark_protocol::{Fix, UserId};
use waymark_store::{LocationLog, MemoryLocationLog};

fn fix(user: &str, timestamp: f64) -> Fix {
    Fix::new(UserId::new(user), -23.5, -46.6, timestamp)
}

#[tokio::test]
async fn test_history_unknown_user_is_empty() {
    let log = MemoryLocationLog::new();
    assert!(log.history(&UserId::new("u"), 10).await.unwrap().is_empty());
    assert!(log.is_empty().await);
}

#[tokio::test]
async fn test_history_is_newest_first() {
    let log = MemoryLocationLog::new();
    for ts in [1.0, 2.0, 3.0] {
        log.append(fix("u", ts)).await.unwrap();
    }

    let history = log.history(&UserId::new("u"), 10).await.unwrap();
    let stamps: Vec<f64> = history.iter().map(|f| f.timestamp).collect();
    assert_eq!(stamps, vec![3.0, 2.0, 1.0]);
}

#[tokio::test]
async fn test_history_respects_limit() {
    let log = MemoryLocationLog::new();
    for ts in 0..10 {
        log.append(fix("u", ts as f64)).await.unwrap();
    }

    let history = log.history(&UserId::new("u"), 3).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].timestamp, 9.0);

    assert!(log.history(&UserId::new("u"), 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_history_is_per_user() {
    let log = MemoryLocationLog::new();
    log.append(fix("a", 1.0)).await.unwrap();
    log.append(fix("b", 2.0)).await.unwrap();
    log.append(fix("a", 3.0)).await.unwrap();

    assert_eq!(log.history(&UserId::new("a"), 10).await.unwrap().len(), 2);
    assert_eq!(log.history(&UserId::new("b"), 10).await.unwrap().len(), 1);
    assert_eq!(log.len().await, 3);
}

#[tokio::test]
async fn test_append_keeps_optional_telemetry() {
    let log = MemoryLocationLog::new();
    let mut f = fix("u", 1.0);
    f.accuracy = Some(3.5);
    f.heading = Some(270.0);
    log.append(f.clone()).await.unwrap();

    assert_eq!(log.history(&UserId::new("u"), 1).await.unwrap(), vec![f]);
}
