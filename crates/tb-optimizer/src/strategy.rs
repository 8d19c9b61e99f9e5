//! Search strategies and the names they are selected by.

use std::fmt;
use std::str::FromStr;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tb_types::{config_error, ParameterSet, TbError, TbResult};

use crate::space::SearchSpace;
use crate::surrogate::{ExtraTreesForest, GaussianProcess, QuantileBoosting, SurrogateSearch};

/// Common trait for all search strategies.
pub trait SearchStrategy: Send + Sync {
    /// Generate the next batch of parameter combinations to evaluate.
    fn suggest(&mut self, count: usize) -> TbResult<Vec<ParameterSet>>;

    /// Report a completed evaluation so adaptive strategies can learn.
    fn report(&mut self, _params: &ParameterSet, _objective: f64) {}

    /// Human-readable strategy name.
    fn name(&self) -> &str;
}

/// The four supported optimizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    RandomSearch,
    /// Gaussian-process surrogate.
    Bayesian,
    GradientBoostedTrees,
    /// Extra-trees forest surrogate.
    DecisionTrees,
}

impl SearchMethod {
    pub const ALL: [SearchMethod; 4] = [
        SearchMethod::RandomSearch,
        SearchMethod::Bayesian,
        SearchMethod::GradientBoostedTrees,
        SearchMethod::DecisionTrees,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMethod::RandomSearch => "random_search",
            SearchMethod::Bayesian => "bayesian",
            SearchMethod::GradientBoostedTrees => "gradient_boosted_trees",
            SearchMethod::DecisionTrees => "decision_trees",
        }
    }

    /// Build a seeded strategy over `space`.
    pub fn build(self, space: SearchSpace, seed: u64) -> TbResult<Box<dyn SearchStrategy>> {
        space.validate()?;
        Ok(match self {
            SearchMethod::RandomSearch => Box::new(RandomSearch::new(space, seed)),
            SearchMethod::Bayesian => {
                Box::new(SurrogateSearch::new(space, GaussianProcess::default(), seed))
            }
            SearchMethod::GradientBoostedTrees => {
                Box::new(SurrogateSearch::new(space, QuantileBoosting::default(), seed))
            }
            SearchMethod::DecisionTrees => {
                Box::new(SurrogateSearch::new(space, ExtraTreesForest::default(), seed))
            }
        })
    }
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMethod {
    type Err = TbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random_search" | "random" | "dummy_minimize" => Ok(SearchMethod::RandomSearch),
            "bayesian" | "gp" | "gp_minimize" => Ok(SearchMethod::Bayesian),
            "gradient_boosted_trees" | "gbrt" | "gbrt_minimize" => {
                Ok(SearchMethod::GradientBoostedTrees)
            }
            "decision_trees" | "forest" | "forest_minimize" => Ok(SearchMethod::DecisionTrees),
            other => Err(config_error!(
                "Unknown search strategy '{}'; expected one of random_search, bayesian, \
                 gradient_boosted_trees, decision_trees",
                other
            )),
        }
    }
}

// ---- Random search ----

/// Independent random sampling across the search space.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    space: SearchSpace,
    rng: ChaCha8Rng,
}

impl RandomSearch {
    pub fn new(space: SearchSpace, seed: u64) -> Self {
        Self {
            space,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl SearchStrategy for RandomSearch {
    fn suggest(&mut self, count: usize) -> TbResult<Vec<ParameterSet>> {
        Ok((0..count).map(|_| self.space.sample(&mut self.rng)).collect())
    }

    fn name(&self) -> &str {
        SearchMethod::RandomSearch.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_strategy_aliases() {
        assert_eq!("random".parse::<SearchMethod>().unwrap(), SearchMethod::RandomSearch);
        assert_eq!("gp_minimize".parse::<SearchMethod>().unwrap(), SearchMethod::Bayesian);
        assert_eq!(
            "GBRT_minimize".parse::<SearchMethod>().unwrap(),
            SearchMethod::GradientBoostedTrees
        );
        assert_eq!(
            "decision_trees".parse::<SearchMethod>().unwrap(),
            SearchMethod::DecisionTrees
        );
        for method in SearchMethod::ALL {
            assert_eq!(method.as_str().parse::<SearchMethod>().unwrap(), method);
        }
    }

    #[test]
    fn unknown_strategy_is_config_error() {
        let err = "simulated_annealing".parse::<SearchMethod>().unwrap_err();
        assert!(matches!(err, TbError::Config(_)));
    }

    #[test]
    fn random_search_is_reproducible() {
        let mut a = RandomSearch::new(SearchSpace::boosting(), 3);
        let mut b = RandomSearch::new(SearchSpace::boosting(), 3);
        assert_eq!(a.suggest(5).unwrap(), b.suggest(5).unwrap());
    }

    #[test]
    fn build_rejects_empty_space() {
        assert!(SearchMethod::Bayesian.build(SearchSpace::new(), 0).is_err());
    }
}
