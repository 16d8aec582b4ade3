//! Request deadlines.
//!
//! Each governed operation runs as its own tokio task raced against a
//! timer. When the timer wins the caller gets `DeadlineExceeded` right away
//! and the task is aborted; its result, if it ever has one, goes nowhere.

use std::future::Future;
use std::time::Duration;

use crate::config::TimeoutConfig;
use crate::error::{Result, WikidiceError};

/// The operations a deadline is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Lookup,
    Members,
    Autocomplete,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::Lookup => "lookup",
            Operation::Members => "category members",
            Operation::Autocomplete => "autocomplete",
        }
    }
}

/// Enforces per-operation deadlines around store-bound work.
#[derive(Debug, Clone)]
pub struct RequestGovernor {
    timeouts: TimeoutConfig,
}

impl RequestGovernor {
    pub fn new(timeouts: TimeoutConfig) -> Self {
        Self { timeouts }
    }

    pub fn timeout_for(&self, operation: Operation) -> Duration {
        match operation {
            Operation::Lookup => self.timeouts.lookup(),
            Operation::Members => self.timeouts.members(),
            Operation::Autocomplete => self.timeouts.autocomplete(),
        }
    }

    /// Run `work` under the deadline configured for `operation`.
    pub async fn govern<F, T>(&self, operation: Operation, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        run_with_deadline(operation.name(), self.timeout_for(operation), work).await
    }
}

/// Spawn `work` and wait at most `timeout` for it.
///
/// On expiry the task is aborted: dropping its future drops any in-flight
/// store call, which interrupts the running statement.
pub async fn run_with_deadline<F, T>(operation: &'static str, timeout: Duration, work: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let mut handle = tokio::spawn(work);

    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(WikidiceError::Internal(format!(
            "{} task failed: {}",
            operation, join_error
        ))),
        Err(_) => {
            handle.abort();
            log::warn!("{} abandoned after {}ms", operation, timeout.as_millis());
            Err(WikidiceError::DeadlineExceeded { operation, timeout })
        }
    }
}
