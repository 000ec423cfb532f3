//! Per-invocation timeout and bounded retry for transient failures

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use tracing::warn;

use crate::agents::config::RouterConfig;
use crate::agents::error::{RouterError, RouterResult};

const MAX_RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Result of a retried operation with the number of attempts made
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: RouterResult<T>,
    pub attempts: u32,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Bound on each attempt
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RouterConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            timeout: Duration::from_secs(config.agent_timeout_seconds),
        }
    }

    /// Run `op` until it succeeds, fails permanently or retries run out.
    ///
    /// A timed-out attempt counts as transient. `op` receives the 1-based
    /// attempt number.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Attempted<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = RouterResult<T>>,
    {
        let mut delays = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.base_delay)
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_interval(MAX_RETRY_INTERVAL)
            .with_max_elapsed_time(None)
            .build();

        let mut attempt = 1;
        loop {
            let result = match tokio::time::timeout(self.timeout, op(attempt)).await {
                Ok(result) => result,
                Err(_) => Err(RouterError::Timeout(self.timeout.as_secs())),
            };

            match result {
                Err(e) if e.is_transient() && attempt <= self.max_retries => {
                    let delay = delays.next_backoff().unwrap_or(self.base_delay);
                    warn!(
                        operation = label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Transient failure, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => {
                    return Attempted {
                        result,
                        attempts: attempt,
                    }
                }
            }
        }
    }
}
