//! Integration tests for the persistence throttle.

use std::time::Duration;

use waymark_protocol::{Fix, UserId};
use waymark_throttle::geo::distance;
use waymark_throttle::{Decision, ThrottleConfig, ThrottlePolicy};

// =========================================================================
// Helpers
// =========================================================================

fn fix_at(lat: f64, lng: f64, timestamp: f64) -> Fix {
    Fix::new(UserId::new("u-1"), lat, lng, timestamp)
}

/// Approximate: one degree of latitude is ~111.2 km on the haversine sphere.
fn meters_north(base: &Fix, meters: f64, timestamp: f64) -> Fix {
    let dlat = meters / 111_195.0;
    fix_at(base.latitude + dlat, base.longitude, timestamp)
}

// =========================================================================
// Geo
// =========================================================================

#[test]
fn test_distance_small_offset_is_about_eleven_meters() {
    let d = distance(-23.5, -46.6, -23.5001, -46.6);
    assert!((10.0..15.0).contains(&d), "got {d}");
}

#[test]
fn test_distance_sao_paulo_to_rio() {
    let d = distance(-23.5, -46.6, -22.9, -43.2);
    assert!((350_000.0..380_000.0).contains(&d), "got {d}");
}

// =========================================================================
// ThrottleConfig
// =========================================================================

#[test]
fn test_default_config_thresholds() {
    let cfg = ThrottleConfig::default();
    assert_eq!(cfg.min_distance_m, 10.0);
    assert_eq!(cfg.min_interval, Duration::from_secs(30));
}

#[test]
fn test_validated_clamps_negative_distance() {
    let cfg = ThrottleConfig::new(-5.0, Duration::from_secs(30)).validated();
    assert_eq!(cfg.min_distance_m, 0.0);
}

#[test]
fn test_validated_clamps_nan_distance() {
    let policy = ThrottlePolicy::new(ThrottleConfig::new(f64::NAN, Duration::from_secs(30)));
    assert_eq!(policy.config().min_distance_m, 0.0);
}

// =========================================================================
// Decisions
// =========================================================================

#[test]
fn test_evaluate_no_previous_fix_is_first() {
    let policy = ThrottlePolicy::default();
    let decision = policy.evaluate(None, &fix_at(0.0, 0.0, 0.0));
    assert_eq!(decision, Decision::First);
    assert!(decision.is_accept());
    assert_eq!(decision.distance_m(), None);
}

#[test]
fn test_should_persist_small_move_short_interval_rejected() {
    let policy = ThrottlePolicy::default();
    let last = fix_at(-23.5, -46.6, 1000.0);
    let new = meters_north(&last, 5.0, 1010.0);

    assert!(!policy.should_persist(Some(&last), &new));
    assert!(matches!(
        policy.evaluate(Some(&last), &new),
        Decision::Throttled { .. }
    ));
}

#[test]
fn test_should_persist_small_move_long_interval_accepted() {
    let policy = ThrottlePolicy::default();
    let last = fix_at(-23.5, -46.6, 1000.0);
    let new = meters_north(&last, 5.0, 1031.0);

    assert!(policy.should_persist(Some(&last), &new));
    assert!(matches!(
        policy.evaluate(Some(&last), &new),
        Decision::Elapsed { .. }
    ));
}

#[test]
fn test_should_persist_large_move_short_interval_accepted() {
    let policy = ThrottlePolicy::default();
    let last = fix_at(-23.5, -46.6, 1000.0);
    let new = meters_north(&last, 15.0, 1001.0);

    assert!(policy.should_persist(Some(&last), &new));
    match policy.evaluate(Some(&last), &new) {
        Decision::Moved { distance_m } => assert!(distance_m >= 10.0),
        other => panic!("expected Moved, got {other:?}"),
    }
}

#[test]
fn test_should_persist_identical_fix_rejected() {
    let policy = ThrottlePolicy::default();
    let last = fix_at(-23.5, -46.6, 1000.0);
    assert!(!policy.should_persist(Some(&last), &last.clone()));
}

#[test]
fn test_should_persist_interval_boundary_is_inclusive() {
    let policy = ThrottlePolicy::default();
    let last = fix_at(-23.5, -46.6, 1000.0);
    let new = fix_at(-23.5, -46.6, 1030.0);
    assert!(policy.should_persist(Some(&last), &new));
}

#[test]
fn test_should_persist_older_timestamp_only_passes_on_distance() {
    let policy = ThrottlePolicy::default();
    let last = fix_at(-23.5, -46.6, 1000.0);

    let stale_still = fix_at(-23.5, -46.6, 900.0);
    assert!(!policy.should_persist(Some(&last), &stale_still));

    let stale_moved = meters_north(&last, 50.0, 900.0);
    assert!(policy.should_persist(Some(&last), &stale_moved));
}

#[test]
fn test_custom_thresholds_are_respected() {
    let policy = ThrottlePolicy::new(ThrottleConfig::new(100.0, Duration::from_secs(5)));
    let last = fix_at(0.0, 0.0, 0.0);

    assert!(!policy.should_persist(Some(&last), &meters_north(&last, 50.0, 2.0)));
    assert!(policy.should_persist(Some(&last), &meters_north(&last, 50.0, 6.0)));
}

#[test]
fn test_decision_display() {
    assert_eq!(Decision::First.to_string(), "first");
    assert_eq!(
        Decision::Throttled {
            distance_m: 1.0,
            interval_s: 1.0
        }
        .to_string(),
        "throttled"
    );
}
