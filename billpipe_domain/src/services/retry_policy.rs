// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Processor Retry/Backoff Policy
//!
//! Pure scheduling math for the chunk processor (spec §4.3): staggered
//! chunk start times, and exponential jittered backoff on a retryable
//! failure. Kept free of any actual `sleep`/clock so it can be tested
//! without a `tokio` runtime; the infrastructure layer drives these
//! durations through its own timer.

use std::time::Duration;

/// Tunable knobs, one instance per pipeline run, normally loaded from the
/// environment variables of the same name (spec §8).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub chunk_stagger: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 10,
            base_backoff: Duration::from_secs(2),
            chunk_stagger: Duration::from_millis(1500),
        }
    }
}

/// The delay before chunk `index` (0-based) begins processing, staggered so
/// a burst of chunks doesn't open its HTTP connections in the same instant.
pub fn stagger_delay(config: &RetryConfig, chunk_index: u32) -> Duration {
    config.chunk_stagger * chunk_index
}

/// Exponential backoff with full jitter for attempt `attempt` (1-based):
/// `jitter_fraction * base * 2^(attempt - 1)`, where `jitter_fraction` is
/// supplied by the caller (normally sampled uniformly from `[0.5, 1.5)`) so
/// this function stays deterministic and testable.
pub fn backoff_delay(config: &RetryConfig, attempt: u32, jitter_fraction: f64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(20);
    let multiplier = 2u64.saturating_pow(exponent) as f64;
    let seconds = config.base_backoff.as_secs_f64() * multiplier * jitter_fraction;
    Duration::from_secs_f64(seconds.max(0.0))
}

/// Whether another attempt is permitted under `config.max_attempts`.
pub fn should_retry(config: &RetryConfig, attempts_so_far: u32) -> bool {
    attempts_so_far < config.max_attempts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stagger_scales_linearly_with_index() {
        let config = RetryConfig::default();
        assert_eq!(stagger_delay(&config, 0), Duration::ZERO);
        assert_eq!(stagger_delay(&config, 2), Duration::from_millis(3000));
    }

    #[test]
    fn backoff_doubles_per_attempt_at_unit_jitter() {
        let config = RetryConfig::default();
        let first = backoff_delay(&config, 1, 1.0);
        let second = backoff_delay(&config, 2, 1.0);
        let third = backoff_delay(&config, 3, 1.0);
        assert_eq!(first, Duration::from_secs(2));
        assert_eq!(second, Duration::from_secs(4));
        assert_eq!(third, Duration::from_secs(8));
    }

    #[test]
    fn jitter_scales_the_delay() {
        let config = RetryConfig::default();
        let half = backoff_delay(&config, 1, 0.5);
        assert_eq!(half, Duration::from_secs(1));
    }

    #[test]
    fn retry_budget_is_respected() {
        let config = RetryConfig::default();
        assert!(should_retry(&config, 9));
        assert!(!should_retry(&config, 10));
    }
}
