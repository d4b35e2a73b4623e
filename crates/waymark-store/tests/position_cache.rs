//! Integration tests for the in-memory position cache.
//!
//! TTL tests run on paused tokio time and step the clock with
//! `tokio::time::advance`.

use std::time::Duration;

use waymark_protocol::{Fix, UserId};
use waymark_store::{CacheConfig, MAX_CACHE_TTL, MemoryPositionCache, PositionCache};

fn fix(user: &str, lat: f64, timestamp: f64) -> Fix {
    Fix::new(UserId::new(user), lat, -46.6, timestamp)
}

fn cache_with_ttl(secs: u64) -> MemoryPositionCache {
    MemoryPositionCache::new(CacheConfig {
        ttl: Duration::from_secs(secs),
        ..CacheConfig::default()
    })
}

#[test]
fn test_default_config_ttl_is_one_hour() {
    let cfg = CacheConfig::default();
    assert_eq!(cfg.ttl, Duration::from_secs(3600));
    assert!(!cfg.reject_out_of_order);
}

#[tokio::test]
async fn test_huge_ttl_is_clamped_and_put_does_not_overflow() {
    let cache = MemoryPositionCache::new(CacheConfig {
        ttl: Duration::MAX,
        ..CacheConfig::default()
    });
    assert_eq!(cache.config().ttl, MAX_CACHE_TTL);

    cache.put(fix("u-1", 1.0, 1.0)).await.unwrap();
    assert!(cache.get(&UserId::new("u-1")).await.unwrap().is_some());
}

#[tokio::test]
async fn test_get_unknown_user_is_absent() {
    let cache = MemoryPositionCache::default();
    assert_eq!(cache.get(&UserId::new("nobody")).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_put_then_get_until_ttl_elapses() {
    let cache = cache_with_ttl(60);
    let f = fix("u-1", -23.5, 1000.0);
    cache.put(f.clone()).await.unwrap();

    assert_eq!(cache.get(&f.user_id).await.unwrap(), Some(f.clone()));

    tokio::time::advance(Duration::from_secs(59)).await;
    assert_eq!(cache.get(&f.user_id).await.unwrap(), Some(f.clone()));

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(cache.get(&f.user_id).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_put_resets_expiry() {
    let cache = cache_with_ttl(60);
    cache.put(fix("u-1", 1.0, 1.0)).await.unwrap();

    tokio::time::advance(Duration::from_secs(50)).await;
    cache.put(fix("u-1", 2.0, 2.0)).await.unwrap();

    tokio::time::advance(Duration::from_secs(50)).await;
    let got = cache.get(&UserId::new("u-1")).await.unwrap().unwrap();
    assert_eq!(got.latitude, 2.0);
}

#[tokio::test]
async fn test_put_overwrites_last_write_wins() {
    let cache = MemoryPositionCache::default();
    cache.put(fix("u-1", 1.0, 2000.0)).await.unwrap();
    // Older timestamp, later write: still wins by default.
    cache.put(fix("u-1", 2.0, 1000.0)).await.unwrap();

    let got = cache.get(&UserId::new("u-1")).await.unwrap().unwrap();
    assert_eq!(got.latitude, 2.0);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_put_reject_out_of_order_keeps_newer_fix() {
    let cache = MemoryPositionCache::new(CacheConfig {
        reject_out_of_order: true,
        ..CacheConfig::default()
    });
    cache.put(fix("u-1", 1.0, 2000.0)).await.unwrap();
    cache.put(fix("u-1", 2.0, 1000.0)).await.unwrap();

    let got = cache.get(&UserId::new("u-1")).await.unwrap().unwrap();
    assert_eq!(got.latitude, 1.0);

    cache.put(fix("u-1", 3.0, 3000.0)).await.unwrap();
    let got = cache.get(&UserId::new("u-1")).await.unwrap().unwrap();
    assert_eq!(got.latitude, 3.0);
}

#[tokio::test(start_paused = true)]
async fn test_reject_out_of_order_ignores_expired_entry() {
    let cache = MemoryPositionCache::new(CacheConfig {
        ttl: Duration::from_secs(10),
        reject_out_of_order: true,
    });
    cache.put(fix("u-1", 1.0, 2000.0)).await.unwrap();
    tokio::time::advance(Duration::from_secs(11)).await;

    cache.put(fix("u-1", 2.0, 1000.0)).await.unwrap();
    let got = cache.get(&UserId::new("u-1")).await.unwrap().unwrap();
    assert_eq!(got.latitude, 2.0);
}

#[tokio::test(start_paused = true)]
async fn test_get_many_returns_only_live_entries() {
    let cache = cache_with_ttl(60);
    cache.put(fix("a", 1.0, 1.0)).await.unwrap();
    tokio::time::advance(Duration::from_secs(40)).await;
    cache.put(fix("b", 2.0, 2.0)).await.unwrap();
    tokio::time::advance(Duration::from_secs(30)).await;

    let ids = [UserId::new("a"), UserId::new("b"), UserId::new("c")];
    let found = cache.get_many(&ids).await.unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[&UserId::new("b")].latitude, 2.0);
}

#[tokio::test(start_paused = true)]
async fn test_purge_expired_reclaims_entries() {
    let cache = cache_with_ttl(60);
    cache.put(fix("a", 1.0, 1.0)).await.unwrap();
    cache.put(fix("b", 1.0, 1.0)).await.unwrap();
    assert_eq!(cache.purge_expired().await, 0);

    tokio::time::advance(Duration::from_secs(30)).await;
    cache.put(fix("b", 2.0, 2.0)).await.unwrap();
    tokio::time::advance(Duration::from_secs(31)).await;

    assert_eq!(cache.len(), 2, "expired entries linger until purged");
    assert_eq!(cache.purge_expired().await, 1);
    assert_eq!(cache.len(), 1);
    assert!(cache.get(&UserId::new("b")).await.unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_for_distinct_users() {
    let cache = std::sync::Arc::new(MemoryPositionCache::default());
    let mut handles = Vec::new();
    for i in 0..32 {
        let cache = std::sync::Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            for n in 0..50 {
                cache
                    .put(fix(&format!("u-{i}"), n as f64 * 0.001, n as f64))
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(cache.len(), 32);
    for i in 0..32 {
        let got = cache.get(&UserId::new(format!("u-{i}"))).await.unwrap().unwrap();
        assert_eq!(got.timestamp, 49.0);
    }
}
