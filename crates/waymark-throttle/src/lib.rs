//! Persistence throttle for Waymark.
//!
//! Every inbound fix refreshes the live cache, but only some of them are
//! worth recording durably. [`ThrottlePolicy`] decides which: a fix is
//! recorded when the user has moved at least `min_distance_m` or at least
//! `min_interval` has passed since their last known fix.
//!
//! ```rust
//! use waymark_protocol::{Fix, UserId};
//! use waymark_throttle::{Decision, ThrottlePolicy};
//!
//! let policy = ThrottlePolicy::default();
//! let user = UserId::new("u-1");
//! let last = Fix::new(user.clone(), -23.5, -46.6, 1000.0);
//! let jitter = Fix::new(user, -23.50001, -46.6, 1005.0);
//!
//! assert_eq!(policy.evaluate(None, &last), Decision::First);
//! assert!(!policy.should_persist(Some(&last), &jitter));
//! ```

pub mod geo;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};
use waymark_protocol::Fix;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Thresholds for the persistence throttle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Minimum displacement, in meters, that makes a fix worth recording.
    pub min_distance_m: f64,
    /// Minimum time since the last fix that makes a fix worth recording.
    pub min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_distance_m: 10.0,
            min_interval: Duration::from_secs(30),
        }
    }
}

impl ThrottleConfig {
    /// Builds a config from explicit thresholds.
    pub fn new(min_distance_m: f64, min_interval: Duration) -> Self {
        Self {
            min_distance_m,
            min_interval,
        }
    }

    /// Clamp any out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`ThrottlePolicy::new`]. A negative or
    /// non-finite `min_distance_m` becomes `0.0`, which records every fix.
    pub fn validated(mut self) -> Self {
        if !self.min_distance_m.is_finite() || self.min_distance_m < 0.0 {
            warn!(
                min_distance_m = self.min_distance_m,
                "min_distance_m is not a non-negative number, clamping to 0"
            );
            self.min_distance_m = 0.0;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// The outcome of evaluating one fix against the previous one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// No previous fix for this user; always recorded.
    First,
    /// Moved far enough.
    Moved { distance_m: f64 },
    /// Stayed close, but enough time passed.
    Elapsed { distance_m: f64, interval_s: f64 },
    /// Neither threshold reached; not recorded.
    Throttled { distance_m: f64, interval_s: f64 },
}

impl Decision {
    /// Whether the fix should be appended to the durable log.
    pub fn is_accept(&self) -> bool {
        !matches!(self, Self::Throttled { .. })
    }

    /// Measured displacement from the previous fix, if there was one.
    pub fn distance_m(&self) -> Option<f64> {
        match *self {
            Self::First => None,
            Self::Moved { distance_m }
            | Self::Elapsed { distance_m, .. }
            | Self::Throttled { distance_m, .. } => Some(distance_m),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => write!(f, "first"),
            Self::Moved { .. } => write!(f, "moved"),
            Self::Elapsed { .. } => write!(f, "elapsed"),
            Self::Throttled { .. } => write!(f, "throttled"),
        }
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Decides whether an inbound fix is recorded durably.
///
/// Stateless apart from its thresholds; the caller supplies the previous
/// fix (normally from the position cache).
#[derive(Debug, Clone, Default)]
pub struct ThrottlePolicy {
    config: ThrottleConfig,
}

impl ThrottlePolicy {
    /// Creates a policy from config, clamping invalid thresholds.
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config: config.validated(),
        }
    }

    /// The thresholds in effect.
    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Classifies `new` relative to `last`.
    ///
    /// Distance is checked first, so a fix that both moved and waited is
    /// reported as [`Decision::Moved`]. A fix whose timestamp is earlier
    /// than `last` has a negative interval and can only pass on distance.
    pub fn evaluate(&self, last: Option<&Fix>, new: &Fix) -> Decision {
        let Some(last) = last else {
            return Decision::First;
        };

        let distance_m =
            geo::distance(last.latitude, last.longitude, new.latitude, new.longitude);
        let interval_s = new.timestamp - last.timestamp;

        let decision = if distance_m >= self.config.min_distance_m {
            Decision::Moved { distance_m }
        } else if interval_s >= self.config.min_interval.as_secs_f64() {
            Decision::Elapsed {
                distance_m,
                interval_s,
            }
        } else {
            Decision::Throttled {
                distance_m,
                interval_s,
            }
        };

        trace!(
            user_id = %new.user_id,
            distance_m,
            interval_s,
            %decision,
            "throttle evaluated"
        );
        decision
    }

    /// `true` when `new` should be appended to the durable log.
    pub fn should_persist(&self, last: Option<&Fix>, new: &Fix) -> bool {
        self.evaluate(last, new).is_accept()
    }
}
