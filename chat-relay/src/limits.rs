//! Rate limiting for chat-relay.
//!
//! Every inbound message passes three checks, cheapest first:
//! 1. the size gate (payload bytes, larger ceiling for image data),
//! 2. the connection's fixed-window counter,
//! 3. a global GCRA limiter capping aggregate throughput.
//!
//! The first two are pure and live in `chat_core::admission`; the global
//! limiter uses the governor crate.

use crate::config::{ConfigError, LimitsConfig};
use chat_core::{admission, AdmissionError, AdmissionPolicy, PayloadClass, WindowCounter};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Type alias for a direct (non-keyed) rate limiter.
type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limiters for the relay server.
#[derive(Clone)]
pub struct RateLimits {
    /// Per-connection size and window limits.
    policy: AdmissionPolicy,

    /// Global rate limiter across all connections.
    ///
    /// Prevents aggregate overload even if individual connections are within
    /// their windows.
    global_limiter: Arc<DirectLimiter>,
}

impl std::fmt::Debug for RateLimits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimits")
            .field("policy", &self.policy)
            .field("global_limiter", &"DirectLimiter")
            .finish()
    }
}

impl RateLimits {
    /// Create rate limiters from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the global rate is zero.
    pub fn new(config: &LimitsConfig) -> Result<Self, ConfigError> {
        let global_rps =
            NonZeroU32::new(config.global_messages_per_second).ok_or(ConfigError::Invalid {
                field: "limits.global_messages_per_second",
                reason: "must be greater than zero".to_string(),
            })?;

        Ok(Self {
            policy: config.policy(),
            global_limiter: Arc::new(RateLimiter::direct(Quota::per_second(global_rps))),
        })
    }

    /// The per-connection admission policy.
    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    /// Check one inbound payload against every limit.
    ///
    /// # Returns
    ///
    /// The payload class if admitted, or the first limit it violated. A
    /// message the global limiter rejects gives its window slot back, so the
    /// connection's count only covers messages that were processed.
    pub fn check_message(
        &self,
        payload: &str,
        counter: &WindowCounter,
    ) -> Result<PayloadClass, RateLimitError> {
        let window_start = counter.window_start_ms();
        let class = admission::admit(payload, counter, &self.policy)?;
        if let Err(e) = self.check_global() {
            counter.release(window_start);
            return Err(e);
        }
        Ok(class)
    }

    /// Check if the global message rate is within limits.
    pub fn check_global(&self) -> Result<(), RateLimitError> {
        self.global_limiter
            .check()
            .map_err(|_| RateLimitError::GlobalLimitExceeded)
    }
}

/// Rate limit error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// Rejected by the connection's size or window gate.
    Admission(AdmissionError),
    /// Global message rate exceeded across all connections.
    GlobalLimitExceeded,
}

impl From<AdmissionError> for RateLimitError {
    fn from(e: AdmissionError) -> Self {
        Self::Admission(e)
    }
}

impl std::fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admission(e) => write!(f, "{e}"),
            Self::GlobalLimitExceeded => {
                write!(f, "global rate limit exceeded")
            }
        }
    }
}

impl std::error::Error for RateLimitError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> LimitsConfig {
        LimitsConfig {
            messages_per_window: 5,
            window_secs: 60,
            max_text_bytes: 64,
            max_image_bytes: 256,
            global_messages_per_second: 1000,
            reset_tick_ms: 1000,
        }
    }

    #[test]
    fn message_limit_allows_within_window() {
        let limits = RateLimits::new(&test_config()).unwrap();
        let counter = WindowCounter::new(0);

        // First 5 should succeed
        for _ in 0..5 {
            assert!(limits.check_message("hi", &counter).is_ok());
        }

        // 6th should fail
        assert_eq!(
            limits.check_message("hi", &counter),
            Err(RateLimitError::Admission(AdmissionError::RateLimited {
                limit: 5,
                window_secs: 60
            }))
        );
    }

    #[test]
    fn connections_have_independent_windows() {
        let config = LimitsConfig {
            messages_per_window: 2,
            ..test_config()
        };
        let limits = RateLimits::new(&config).unwrap();
        let a = WindowCounter::new(0);
        let b = WindowCounter::new(0);

        assert!(limits.check_message("x", &a).is_ok());
        assert!(limits.check_message("x", &a).is_ok());
        assert!(limits.check_message("x", &a).is_err());

        // Connection B still has its full window
        assert!(limits.check_message("x", &b).is_ok());
        assert!(limits.check_message("x", &b).is_ok());
        assert!(limits.check_message("x", &b).is_err());
    }

    #[test]
    fn oversized_message_rejected_before_window() {
        let limits = RateLimits::new(&test_config()).unwrap();
        let counter = WindowCounter::new(0);

        let err = limits
            .check_message(&"x".repeat(65), &counter)
            .unwrap_err();
        assert!(matches!(
            err,
            RateLimitError::Admission(AdmissionError::PayloadTooLarge { limit: 64, .. })
        ));
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn global_rate_limiter_rejects_excess() {
        let config = LimitsConfig {
            messages_per_window: 100,
            global_messages_per_second: 5,
            ..test_config()
        };
        let limits = RateLimits::new(&config).unwrap();

        // First 5 should succeed
        for _ in 0..5 {
            assert!(limits.check_global().is_ok());
        }

        // 6th should fail
        assert_eq!(
            limits.check_global(),
            Err(RateLimitError::GlobalLimitExceeded)
        );
    }

    #[test]
    fn global_rejection_does_not_use_window_slot() {
        let config = LimitsConfig {
            messages_per_window: 5,
            global_messages_per_second: 1,
            ..test_config()
        };
        let limits = RateLimits::new(&config).unwrap();
        let counter = WindowCounter::new(0);

        assert!(limits.check_message("first", &counter).is_ok());
        assert_eq!(
            limits.check_message("second", &counter),
            Err(RateLimitError::GlobalLimitExceeded)
        );
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn zero_global_rate_is_rejected() {
        let config = LimitsConfig {
            global_messages_per_second: 0,
            ..test_config()
        };
        assert!(RateLimits::new(&config).is_err());
    }

    #[test]
    fn rate_limits_are_debug() {
        let limits = RateLimits::new(&test_config()).unwrap();
        let debug = format!("{:?}", limits);
        assert!(debug.contains("RateLimits"));
    }

    #[test]
    fn rate_limit_error_display() {
        assert_eq!(
            RateLimitError::GlobalLimitExceeded.to_string(),
            "global rate limit exceeded"
        );
        assert_eq!(
            RateLimitError::Admission(AdmissionError::RateLimited {
                limit: 3,
                window_secs: 60
            })
            .to_string(),
            "rate limit exceeded: 3 messages per 60s"
        );
    }
}
