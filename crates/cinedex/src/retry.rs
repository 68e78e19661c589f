//! 🔄 Retry policy: exponential backoff, no jitter, hard attempt ceiling.
//!
//! 🎬 *[the database blinks. the cluster hiccups. the retry loop does not panic.]*
//! *[it waits one second. then two. then four. it has done this before.]*
//!
//! Every flaky call in the crate (Postgres connect + query, the `_bulk` POST) goes
//! through [`RetryPolicy::run`]. The delay before retry `n` is
//! `initial_interval * backoff_coefficient^(n-1)`, optionally clamped to
//! `maximum_interval`. When the ceiling is reached the last error comes back with
//! context naming the operation, and the current pass for that entity is over.

use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::warn;

/// 🔧 Retry knobs as they appear in config, under `[runtime.retry]`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RetryConfig {
    /// 🎯 Total attempts, including the first one. 10 by default.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// ⏱️ Delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,
    /// 📈 Each retry waits this many times longer than the previous one.
    #[serde(default = "default_backoff_coefficient")]
    pub backoff_coefficient: u32,
    /// 🧢 Optional ceiling on a single delay, in milliseconds.
    #[serde(default)]
    pub maximum_interval_ms: Option<u64>,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_initial_interval_ms() -> u64 {
    1000
}

fn default_backoff_coefficient() -> u32 {
    2
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_interval_ms: default_initial_interval_ms(),
            backoff_coefficient: default_backoff_coefficient(),
            maximum_interval_ms: None,
        }
    }
}

/// 🔄 The policy itself. `Copy`, because every stage that does I/O carries one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_interval: Duration,
    backoff_coefficient: u32,
    maximum_interval: Option<Duration>,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        initial_interval: Duration,
        backoff_coefficient: u32,
        maximum_interval: Option<Duration>,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_interval,
            backoff_coefficient: backoff_coefficient.max(1),
            maximum_interval,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// ⏱️ How long to sleep before retry number `retry` (1-based).
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let factor = self.backoff_coefficient.saturating_pow(exponent);
        let candidate = self.initial_interval.saturating_mul(factor);
        match self.maximum_interval {
            Some(ceiling) => candidate.min(ceiling),
            None => candidate,
        }
    }

    /// 🚀 Run `op` until it succeeds or the attempt ceiling is hit.
    ///
    /// `state` is lent to every attempt, so an operation can reconnect, reset a cursor,
    /// or otherwise fix itself up between tries. `op` returns a boxed future borrowing
    /// that state; owned arguments should be cloned into the future per attempt.
    pub async fn run<S, T, F>(&self, operation: &str, state: &mut S, mut op: F) -> Result<T>
    where
        S: ?Sized + Send,
        F: for<'a> FnMut(&'a mut S) -> BoxFuture<'a, Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op(state).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= self.max_attempts => {
                    return Err(err).context(format!(
                        "💀 '{}' failed {} times in a row. The backoff has backed off as far as it goes. Giving up on this pass.",
                        operation, attempt
                    ));
                }
                Err(err) => {
                    let delay = self.delay_before_retry(attempt);
                    warn!(
                        "🔄 '{}' attempt {}/{} failed: {:#}. Trying again in {:?}.",
                        operation, attempt, self.max_attempts, err, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_interval_ms),
            config.backoff_coefficient,
            config.maximum_interval_ms.map(Duration::from_millis),
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}
