//! Ramp parameters.
//!
//! The values a control surface supplies to `start`.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use ws_loadpool::RampOptions;
//!
//! let options = RampOptions::new(50)
//!     .with_join_interval(Duration::from_millis(100))
//!     .with_heartbeat_interval(Duration::from_secs(2));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Default pause between opens.
pub const DEFAULT_JOIN_INTERVAL: Duration = Duration::from_millis(200);

/// Default heartbeat period.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1000);

/// Default pool size.
pub const DEFAULT_TARGET: usize = 1;

// ============================================================================
// RampOptions
// ============================================================================

/// Parameters of one `start` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampOptions {
    /// Desired number of live connections.
    pub target: usize,

    /// Minimum pause between successive opens during ramp-up.
    pub join_interval: Duration,

    /// Heartbeat period of each connection. Zero sends one heartbeat.
    pub heartbeat_interval: Duration,

    /// Ready-count report period. Falls back to the heartbeat period.
    pub report_interval: Option<Duration>,
}

impl Default for RampOptions {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET)
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl RampOptions {
    /// Creates options for `target` connections with default intervals.
    #[inline]
    #[must_use]
    pub const fn new(target: usize) -> Self {
        Self {
            target,
            join_interval: DEFAULT_JOIN_INTERVAL,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            report_interval: None,
        }
    }

    /// Creates options from millisecond values, as control panels hand them
    /// over.
    #[inline]
    #[must_use]
    pub const fn from_millis(target: usize, join_ms: u64, heartbeat_ms: u64) -> Self {
        Self {
            target,
            join_interval: Duration::from_millis(join_ms),
            heartbeat_interval: Duration::from_millis(heartbeat_ms),
            report_interval: None,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl RampOptions {
    /// Sets the target pool size.
    #[inline]
    #[must_use]
    pub fn with_target(mut self, target: usize) -> Self {
        self.target = target;
        self
    }

    /// Sets the pause between opens.
    #[inline]
    #[must_use]
    pub fn with_join_interval(mut self, interval: Duration) -> Self {
        self.join_interval = interval;
        self
    }

    /// Sets the heartbeat period.
    #[inline]
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the report period explicitly.
    #[inline]
    #[must_use]
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = Some(interval);
        self
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl RampOptions {
    /// Returns the effective report period.
    #[inline]
    #[must_use]
    pub fn report_interval(&self) -> Duration {
        self.report_interval.unwrap_or(self.heartbeat_interval)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_control_panel() {
        let options = RampOptions::default();
        assert_eq!(options.target, 1);
        assert_eq!(options.join_interval, Duration::from_millis(200));
        assert_eq!(options.heartbeat_interval, Duration::from_millis(1000));
    }

    #[test]
    fn test_report_interval_falls_back_to_heartbeat() {
        let options = RampOptions::from_millis(3, 0, 750);
        assert_eq!(options.report_interval(), Duration::from_millis(750));

        let options = options.with_report_interval(Duration::from_secs(5));
        assert_eq!(options.report_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_builder_chain() {
        let options = RampOptions::new(0)
            .with_target(20)
            .with_join_interval(Duration::ZERO)
            .with_heartbeat_interval(Duration::from_millis(10));

        assert_eq!(options.target, 20);
        assert!(options.join_interval.is_zero());
        assert_eq!(options.heartbeat_interval, Duration::from_millis(10));
    }
}
