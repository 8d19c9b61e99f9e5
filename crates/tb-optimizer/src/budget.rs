//! Limits on a search run: evaluation count, wall clock, cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tb_types::{SearchError, TbResult};

/// Cooperative cancellation flag shared between a search and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a search loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    BudgetExhausted,
    TimeLimit,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct CallBudget {
    pub max_calls: usize,
    pub max_duration: Option<Duration>,
    pub cancel: CancellationToken,
}

impl CallBudget {
    pub fn new(max_calls: usize) -> Self {
        Self {
            max_calls,
            max_duration: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn validate(&self) -> TbResult<()> {
        if self.max_calls == 0 {
            return Err(SearchError::InvalidBudget(self.max_calls).into());
        }
        Ok(())
    }

    /// `Some` once no further evaluation may start.
    pub fn check(&self, started: Instant, calls: usize) -> Option<StopReason> {
        if self.cancel.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        if calls >= self.max_calls {
            return Some(StopReason::BudgetExhausted);
        }
        match self.max_duration {
            Some(limit) if started.elapsed() >= limit => Some(StopReason::TimeLimit),
            _ => None,
        }
    }
}

impl Default for CallBudget {
    fn default() -> Self {
        Self::new(100)
    }
}
