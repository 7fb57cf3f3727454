//! Decides whether a failed chunk is sent again.

use crate::config::ShouldRetryHook;
use crate::error::FailureEvent;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// What `start` reports once a failure is not retried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryExhaustion {
    /// Report through the hooks only; `start` returns `Ok(UploadState::Failed)`.
    #[default]
    Complete,
    /// Additionally return the last failure's cause from `start`.
    ReturnError,
}

/// An ordered budget of delays, consumed one per retry.
///
/// N delays allow exactly N retries beyond the first attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    delays: VecDeque<Duration>,
    attempt: usize,
}

impl RetryPolicy {
    pub fn new(delays: impl IntoIterator<Item = Duration>) -> Self {
        RetryPolicy {
            delays: delays.into_iter().collect(),
            attempt: 0,
        }
    }

    /// Number of retries granted so far.
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    pub fn remaining(&self) -> usize {
        self.delays.len()
    }

    /// Returns how long to wait before retrying, or `None` to give up.
    ///
    /// The hook is consulted only while delays remain; a delay is consumed
    /// whether or not the hook agrees.
    pub fn next_delay(
        &mut self,
        failure: &FailureEvent,
        should_retry: Option<&mut ShouldRetryHook>,
    ) -> Option<Duration> {
        let delay = self.delays.pop_front()?;
        let retry = match should_retry {
            Some(hook) => hook(failure, delay),
            None => true,
        };
        if !retry {
            return None;
        }
        self.attempt += 1;
        Some(delay)
    }
}
