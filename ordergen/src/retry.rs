//! Retry settings for the Timestream client.
//!
//! Retries are performed by the SDK's standard retry strategy: transient
//! errors (connection failures, timeouts, 500/502/503/504) and throttling
//! errors are retried with exponential backoff and jitter, everything else
//! fails immediately. This module only carries the tunables and their bounds.

use std::time::Duration;

use aws_smithy_types::retry::RetryConfig;
use serde::Deserialize;

/// Largest backoff any single retry may wait.
pub const MAX_BACKOFF_CEILING_MILLISECONDS: u64 = 300_000;

fn default_max_retries() -> u32 {
    10
}

fn default_initial_backoff_milliseconds() -> u64 {
    30
}

fn default_max_backoff_milliseconds() -> u64 {
    20_000
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Errors produced by [`Config::validate`].
pub enum Error {
    /// The initial backoff is zero.
    #[error("initial_backoff_milliseconds must be at least 1")]
    ZeroInitialBackoff,
    /// The initial backoff exceeds the maximum backoff.
    #[error("initial_backoff_milliseconds {initial} exceeds max_backoff_milliseconds {max}")]
    BackoffOrder {
        /// Configured initial backoff
        initial: u64,
        /// Configured maximum backoff
        max: u64,
    },
    /// The maximum backoff exceeds [`MAX_BACKOFF_CEILING_MILLISECONDS`].
    #[error("max_backoff_milliseconds {0} exceeds {MAX_BACKOFF_CEILING_MILLISECONDS}")]
    BackoffCeiling(u64),
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
/// Configuration of the retry policy.
pub struct Config {
    /// Retries made after the first attempt before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff before the first retry, doubled on each further retry
    #[serde(default = "default_initial_backoff_milliseconds")]
    pub initial_backoff_milliseconds: u64,
    /// Upper bound on any single backoff
    #[serde(default = "default_max_backoff_milliseconds")]
    pub max_backoff_milliseconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_milliseconds: default_initial_backoff_milliseconds(),
            max_backoff_milliseconds: default_max_backoff_milliseconds(),
        }
    }
}

impl Config {
    /// Check the backoff bounds.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial backoff is zero or larger than the
    /// maximum, or if the maximum exceeds the ceiling.
    pub fn validate(&self) -> Result<(), Error> {
        if self.initial_backoff_milliseconds == 0 {
            return Err(Error::ZeroInitialBackoff);
        }
        if self.max_backoff_milliseconds > MAX_BACKOFF_CEILING_MILLISECONDS {
            return Err(Error::BackoffCeiling(self.max_backoff_milliseconds));
        }
        if self.initial_backoff_milliseconds > self.max_backoff_milliseconds {
            return Err(Error::BackoffOrder {
                initial: self.initial_backoff_milliseconds,
                max: self.max_backoff_milliseconds,
            });
        }
        Ok(())
    }

    /// The SDK standard retry configuration for these settings. The SDK counts
    /// attempts, so the first attempt is added to `max_retries`.
    #[must_use]
    pub fn sdk_config(&self) -> RetryConfig {
        RetryConfig::standard()
            .with_max_attempts(self.max_retries.saturating_add(1))
            .with_initial_backoff(Duration::from_millis(self.initial_backoff_milliseconds))
            .with_max_backoff(Duration::from_millis(self.max_backoff_milliseconds))
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use aws_smithy_types::retry::RetryMode;

    use super::{Config, Error};

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.initial_backoff_milliseconds, 30);
        assert_eq!(config.max_backoff_milliseconds, 20_000);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn sdk_attempts_include_the_first() {
        let sdk = Config::default().sdk_config();
        assert_eq!(sdk.mode(), RetryMode::Standard);
        assert_eq!(sdk.max_attempts(), 11);
        assert_eq!(sdk.initial_backoff(), Duration::from_millis(30));
        assert_eq!(sdk.max_backoff(), Duration::from_secs(20));

        let saturated = Config {
            max_retries: u32::MAX,
            ..Config::default()
        };
        assert_eq!(saturated.sdk_config().max_attempts(), u32::MAX);
    }

    #[test]
    fn huge_initial_backoff_is_rejected() {
        let config = Config {
            initial_backoff_milliseconds: u64::MAX,
            ..Config::default()
        };
        assert_eq!(
            config.validate(),
            Err(Error::BackoffOrder {
                initial: u64::MAX,
                max: 20_000
            })
        );
    }

    #[test]
    fn backoff_bounds() {
        let zero = Config {
            initial_backoff_milliseconds: 0,
            ..Config::default()
        };
        assert_eq!(zero.validate(), Err(Error::ZeroInitialBackoff));

        let ceiling = Config {
            max_backoff_milliseconds: u64::MAX,
            ..Config::default()
        };
        assert_eq!(ceiling.validate(), Err(Error::BackoffCeiling(u64::MAX)));

        let equal = Config {
            initial_backoff_milliseconds: 300_000,
            max_backoff_milliseconds: 300_000,
            ..Config::default()
        };
        assert_eq!(equal.validate(), Ok(()));
    }
}
