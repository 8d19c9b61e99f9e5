//! Model selection: family + problem kind -> fresh estimator.

use tb_types::{BoostingFamily, ObjectiveLabel, ProblemKind, TbResult};
use tracing::{debug, info};

use crate::estimator::Estimator;
use crate::families::{DepthWiseBooster, LeafWiseBooster};
use crate::params::BoosterParams;

/// Builds untrained estimators with the baseline configuration
/// (seed 42, gain importance, unrestricted depth).
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelSelector;

impl ModelSelector {
    pub fn select(
        problem: ProblemKind,
        family: BoostingFamily,
        objective: Option<ObjectiveLabel>,
    ) -> Box<dyn Estimator> {
        let mut params = match family {
            BoostingFamily::LightGbm => BoosterParams::lightgbm_defaults(),
            BoostingFamily::XgBoost => BoosterParams::xgboost_defaults(),
        };
        match problem {
            ProblemKind::Classification => params.objective = objective,
            ProblemKind::Regression => {
                if let Some(label) = objective {
                    debug!("Ignoring objective '{}' for regression", label);
                }
            }
        }

        info!("Selected {} estimator for {}", family, problem);
        match family {
            BoostingFamily::LightGbm => Box::new(LeafWiseBooster::with_params(problem, params)),
            BoostingFamily::XgBoost => Box::new(DepthWiseBooster::with_params(problem, params)),
        }
    }

    /// Parse family and objective names, then [`ModelSelector::select`].
    pub fn select_by_name(
        problem: ProblemKind,
        family: &str,
        objective: Option<&str>,
    ) -> TbResult<Box<dyn Estimator>> {
        let family: BoostingFamily = family.parse()?;
        let objective = match (problem, objective) {
            (ProblemKind::Classification, Some(name)) => Some(name.parse::<ObjectiveLabel>()?),
            _ => None,
        };
        Ok(Self::select(problem, family, objective))
    }
}
