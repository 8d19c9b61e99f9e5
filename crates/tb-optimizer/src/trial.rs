//! Trial tracking and search run outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tb_types::ParameterSet;
use uuid::Uuid;

use crate::budget::StopReason;
use crate::space::SearchSpace;

/// Unique search run identifier.
pub type SearchId = Uuid;

/// Lifecycle state for a search run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationState {
    Pending,
    Running,
    Completed,
    Cancelled,
}

/// A single evaluated point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub id: Uuid,
    pub trial_number: usize,
    pub parameters: ParameterSet,
    /// Value being minimised.
    pub objective: f64,
    /// Whether the point came from the caller's initial points.
    pub initial: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Every evaluated point and value, in evaluation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchTrace {
    trials: Vec<Trial>,
}

impl SearchTrace {
    pub fn push(&mut self, trial: Trial) {
        self.trials.push(trial);
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    /// Lowest objective; the earliest trial wins ties.
    pub fn best(&self) -> Option<&Trial> {
        self.trials.iter().fold(None, |best: Option<&Trial>, t| match best {
            Some(b) if b.objective <= t.objective => Some(b),
            _ => Some(t),
        })
    }

    pub fn objectives(&self) -> Vec<f64> {
        self.trials.iter().map(|t| t.objective).collect()
    }

    /// Running minimum of the objective after each evaluation.
    pub fn convergence(&self) -> Vec<f64> {
        self.trials
            .iter()
            .scan(f64::INFINITY, |min, t| {
                *min = min.min(t.objective);
                Some(*min)
            })
            .collect()
    }
}

/// Result of a search run: best point, full trace and run metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub id: SearchId,
    pub strategy: String,
    pub space: SearchSpace,
    pub trace: SearchTrace,
    pub state: OptimizationState,
    pub stop_reason: Option<StopReason>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SearchOutcome {
    pub fn new(strategy: impl Into<String>, space: SearchSpace) -> Self {
        Self {
            id: Uuid::new_v4(),
            strategy: strategy.into(),
            space,
            trace: SearchTrace::default(),
            state: OptimizationState::Pending,
            stop_reason: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.state = OptimizationState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.state = OptimizationState::Completed;
        self.stop_reason = Some(StopReason::BudgetExhausted);
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_cancelled(&mut self, reason: StopReason) {
        self.state = OptimizationState::Cancelled;
        self.stop_reason = Some(reason);
        self.finished_at = Some(Utc::now());
    }

    /// Best point as a name -> value map.
    pub fn best_parameters(&self) -> Option<&ParameterSet> {
        self.trace.best().map(|t| &t.parameters)
    }

    pub fn best_objective(&self) -> Option<f64> {
        self.trace.best().map(|t| t.objective)
    }
}
