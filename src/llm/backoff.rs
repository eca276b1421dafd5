/*!
 * Exponential backoff for rate-limited model calls.
 *
 * The policy is independent of any endpoint: it wraps an async operation
 * returning `ProviderError` and retries only failures classified as rate
 * limits. Every other error is returned immediately.
 */

use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;

/// Retry schedule for rate-limited calls
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,

    /// Growth factor between consecutive delays
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound on any single delay
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,

    /// Total attempts including the first call
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_initial_delay_secs() -> u64 {
    60
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay_secs() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay_secs: default_initial_delay_secs(),
            multiplier: default_multiplier(),
            max_delay_secs: default_max_delay_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl BackoffPolicy {
    /// A policy that never waits, for tests and dry runs
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            initial_delay_secs: 0,
            multiplier: 1.0,
            max_delay_secs: 0,
            max_attempts,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(anyhow!("backoff.max_attempts must be at least 1"));
        }
        if self.multiplier < 1.0 {
            return Err(anyhow!("backoff.multiplier must be >= 1.0"));
        }
        if self.max_delay_secs < self.initial_delay_secs {
            return Err(anyhow!("backoff.max_delay_secs must be >= initial_delay_secs"));
        }
        Ok(())
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let secs = self.initial_delay_secs as f64 * self.multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_delay_secs as f64))
    }

    /// Run `operation`, sleeping and retrying while it reports a rate limit.
    /// The sleep is a tokio timer, so other tasks keep running meanwhile.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_rate_limit() => {
                    if attempt >= attempts {
                        return Err(ProviderError::RetriesExhausted {
                            attempts,
                            last: e.to_string(),
                        });
                    }
                    let delay = self.delay_for(attempt);
                    warn!(
                        "{}: rate limited (attempt {}/{}), waiting {}s",
                        label,
                        attempt,
                        attempts,
                        delay.as_secs()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
