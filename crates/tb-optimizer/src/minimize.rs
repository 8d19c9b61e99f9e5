//! The sequential ask/evaluate/tell loop.

use std::time::Instant;

use chrono::Utc;
use tb_types::{format_parameters, ParameterSet, SearchError, TbResult};
use tracing::{info, warn};
use uuid::Uuid;

use crate::budget::{CallBudget, StopReason};
use crate::space::SearchSpace;
use crate::strategy::SearchStrategy;
use crate::trial::{SearchOutcome, Trial};

/// A black-box function to minimise.
pub trait Objective {
    fn evaluate(&mut self, params: &ParameterSet) -> TbResult<f64>;
}

impl<F> Objective for F
where
    F: FnMut(&ParameterSet) -> TbResult<f64>,
{
    fn evaluate(&mut self, params: &ParameterSet) -> TbResult<f64> {
        self(params)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MinimizeConfig {
    pub budget: CallBudget,
    /// Points evaluated before the strategy is asked; they count against
    /// the budget.
    pub initial_points: Vec<ParameterSet>,
}

impl MinimizeConfig {
    pub fn new(budget: CallBudget) -> Self {
        Self {
            budget,
            initial_points: Vec::new(),
        }
    }

    pub fn with_initial_points(mut self, points: Vec<ParameterSet>) -> Self {
        self.initial_points = points;
        self
    }
}

/// Minimise `objective` over `space`.
///
/// Every point is evaluated exactly once and recorded in the trace. The loop
/// stops when the call budget is spent, the time limit passes, or the
/// cancellation token fires; the last two mark the outcome cancelled.
pub fn minimize(
    objective: &mut dyn Objective,
    space: &SearchSpace,
    strategy: &mut dyn SearchStrategy,
    config: &MinimizeConfig,
) -> TbResult<SearchOutcome> {
    space.validate()?;
    config.budget.validate()?;
    for (index, point) in config.initial_points.iter().enumerate() {
        space
            .to_unit(point)
            .map_err(|e| SearchError::InvalidInitialPoint {
                index,
                message: e.to_string(),
            })?;
    }
    if config.initial_points.len() > config.budget.max_calls {
        warn!(
            "{} initial points exceed the budget of {} calls; the rest are skipped",
            config.initial_points.len(),
            config.budget.max_calls
        );
    }

    let mut outcome = SearchOutcome::new(strategy.name(), space.clone());
    outcome.mark_running();
    let started = Instant::now();
    let mut initial = config.initial_points.iter();

    loop {
        let calls = outcome.trace.len();
        if let Some(reason) = config.budget.check(started, calls) {
            match reason {
                StopReason::BudgetExhausted => outcome.mark_completed(),
                other => {
                    warn!("Search stopped early after {} evaluations: {:?}", calls, other);
                    outcome.mark_cancelled(other);
                }
            }
            break;
        }

        let (params, from_initial) = match initial.next() {
            Some(point) => (point.clone(), true),
            None => {
                let mut batch = strategy.suggest(1)?;
                match batch.pop() {
                    Some(point) => (point, false),
                    None => {
                        return Err(SearchError::SurrogateFailed {
                            message: format!("{} returned no suggestion", strategy.name()),
                        }
                        .into())
                    }
                }
            }
        };

        let trial_start = Utc::now();
        let timer = Instant::now();
        let value = objective.evaluate(&params)?;
        if !value.is_finite() {
            return Err(SearchError::NonFiniteObjective {
                params: format_parameters(&params),
            }
            .into());
        }
        strategy.report(&params, value);

        info!(
            "Iteration {}: {} -> objective {:.6}",
            calls + 1,
            format_parameters(&params),
            value
        );
        outcome.trace.push(Trial {
            id: Uuid::new_v4(),
            trial_number: calls,
            parameters: params,
            objective: value,
            initial: from_initial,
            started_at: trial_start,
            duration_ms: timer.elapsed().as_millis() as u64,
        });
    }

    if let Some(best) = outcome.trace.best() {
        info!(
            "Best objective {:.6} at {} after {} evaluations",
            best.objective,
            format_parameters(&best.parameters),
            outcome.trace.len()
        );
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::CancellationToken;
    use crate::strategy::{RandomSearch, SearchMethod};
    use crate::trial::OptimizationState;
    use tb_types::{ParameterValue, TbError};

    fn space() -> SearchSpace {
        SearchSpace::new().add_float("x", -2.0, 2.0).add_int("k", 0, 10)
    }

    fn bowl(params: &ParameterSet) -> TbResult<f64> {
        let x = params["x"].as_f64().unwrap_or(0.0);
        let k = params["k"].as_f64().unwrap_or(0.0);
        Ok((x - 0.5).powi(2) + (k - 3.0).powi(2) / 10.0)
    }

    #[test]
    fn evaluates_exactly_budget_points() {
        let space = space();
        let mut strategy = RandomSearch::new(space.clone(), 1);
        let mut calls = 0;
        let mut objective = |p: &ParameterSet| {
            calls += 1;
            bowl(p)
        };
        let outcome =
            minimize(&mut objective, &space, &mut strategy, &MinimizeConfig::new(CallBudget::new(15)))
                .unwrap();
        assert_eq!(calls, 15);
        assert_eq!(outcome.trace.len(), 15);
        assert_eq!(outcome.state, OptimizationState::Completed);
        let best = outcome.best_objective().unwrap();
        assert_eq!(best, outcome.trace.convergence()[14]);
    }

    #[test]
    fn initial_points_come_first_and_count() {
        let space = space();
        let mut x0 = ParameterSet::new();
        x0.insert("x".into(), ParameterValue::Float(0.5));
        x0.insert("k".into(), ParameterValue::Int(3));
        let config = MinimizeConfig::new(CallBudget::new(4)).with_initial_points(vec![x0.clone()]);
        let mut strategy = RandomSearch::new(space.clone(), 2);
        let outcome = minimize(&mut bowl, &space, &mut strategy, &config).unwrap();
        assert_eq!(outcome.trace.len(), 4);
        assert!(outcome.trace.trials()[0].initial);
        assert_eq!(outcome.best_parameters(), Some(&x0));
        assert_eq!(outcome.best_objective(), Some(0.0));
    }

    #[test]
    fn invalid_initial_point_fails_before_evaluation() {
        let space = space();
        let mut bad = ParameterSet::new();
        bad.insert("x".into(), ParameterValue::Float(9.0));
        bad.insert("k".into(), ParameterValue::Int(3));
        let config = MinimizeConfig::new(CallBudget::new(4)).with_initial_points(vec![bad]);
        let mut strategy = RandomSearch::new(space.clone(), 2);
        let mut calls = 0;
        let mut objective = |p: &ParameterSet| {
            calls += 1;
            bowl(p)
        };
        let err = minimize(&mut objective, &space, &mut strategy, &config).unwrap_err();
        assert!(matches!(
            err,
            TbError::Search(SearchError::InvalidInitialPoint { index: 0, .. })
        ));
        assert_eq!(calls, 0);
    }

    #[test]
    fn cancellation_keeps_evaluated_points() {
        let space = space();
        let token = CancellationToken::new();
        let config = MinimizeConfig::new(CallBudget::new(50).with_cancellation(token.clone()));
        let mut strategy = RandomSearch::new(space.clone(), 3);
        let mut calls = 0;
        let mut objective = |p: &ParameterSet| {
            calls += 1;
            if calls == 3 {
                token.cancel();
            }
            bowl(p)
        };
        let outcome = minimize(&mut objective, &space, &mut strategy, &config).unwrap();
        assert_eq!(outcome.trace.len(), 3);
        assert_eq!(outcome.state, OptimizationState::Cancelled);
        assert_eq!(outcome.stop_reason, Some(StopReason::Cancelled));
    }

    #[test]
    fn non_finite_objective_is_an_error() {
        let space = space();
        let mut strategy = RandomSearch::new(space.clone(), 4);
        let mut objective = |_: &ParameterSet| -> TbResult<f64> { Ok(f64::NAN) };
        let err = minimize(&mut objective, &space, &mut strategy, &MinimizeConfig::default())
            .unwrap_err();
        assert!(matches!(err, TbError::Search(SearchError::NonFiniteObjective { .. })));
    }

    #[test]
    fn every_strategy_stays_in_bounds() {
        let space = space();
        for method in SearchMethod::ALL {
            let mut strategy = method.build(space.clone(), 9).unwrap();
            let outcome = minimize(
                &mut bowl,
                &space,
                strategy.as_mut(),
                &MinimizeConfig::new(CallBudget::new(14)),
            )
            .unwrap();
            assert_eq!(outcome.trace.len(), 14, "{method}");
            for trial in outcome.trace.trials() {
                assert!(space.contains(&trial.parameters), "{method}: {:?}", trial.parameters);
            }
            assert_eq!(outcome.strategy, method.as_str());
        }
    }
}
