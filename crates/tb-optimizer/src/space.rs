//! Search space definitions and the unit-cube mapping used by surrogates.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tb_types::{ParameterSet, ParameterValue, SearchError, TbResult};

/// A single parameter dimension in the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Estimator parameter the dimension is assigned to (e.g. "num_leaves").
    pub name: String,
    pub kind: ParameterKind,
}

/// Describes how a parameter is sampled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterKind {
    /// Continuous uniform range [low, high].
    FloatRange { low: f64, high: f64 },
    /// Integer range [low, high] inclusive.
    IntRange { low: i64, high: i64 },
    /// Log-uniform range (sampled in log-space then exponentiated).
    LogUniform { low: f64, high: f64 },
}

impl ParameterDef {
    fn invalid(&self, message: impl Into<String>) -> SearchError {
        SearchError::InvalidDimension {
            name: self.name.clone(),
            message: message.into(),
        }
    }

    pub fn validate(&self) -> TbResult<()> {
        let ok = match &self.kind {
            ParameterKind::FloatRange { low, high } => low.is_finite() && high.is_finite() && low < high,
            ParameterKind::IntRange { low, high } => low < high,
            ParameterKind::LogUniform { low, high } => {
                *low > 0.0 && high.is_finite() && low < high
            }
        };
        if !ok {
            return Err(self.invalid(format!("invalid bounds {:?}", self.kind)).into());
        }
        Ok(())
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> ParameterValue {
        match &self.kind {
            ParameterKind::FloatRange { low, high } => ParameterValue::Float(rng.random_range(*low..=*high)),
            ParameterKind::IntRange { low, high } => ParameterValue::Int(rng.random_range(*low..=*high)),
            ParameterKind::LogUniform { low, high } => {
                let log_val: f64 = rng.random_range(low.ln()..=high.ln());
                ParameterValue::Float(log_val.exp().clamp(*low, *high))
            }
        }
    }

    /// Position of `value` in [0, 1]; log dimensions are mapped in log-space.
    pub fn to_unit(&self, value: &ParameterValue) -> TbResult<f64> {
        match &self.kind {
            ParameterKind::FloatRange { low, high } => {
                let v = self.float_in_bounds(value, *low, *high)?;
                Ok((v - low) / (high - low))
            }
            ParameterKind::IntRange { low, high } => {
                let v = value
                    .as_i64()
                    .ok_or_else(|| self.invalid(format!("expected an integer, got {value}")))?;
                if v < *low || v > *high {
                    return Err(self.invalid(format!("{v} outside [{low}, {high}]")).into());
                }
                Ok((v - low) as f64 / (high - low) as f64)
            }
            ParameterKind::LogUniform { low, high } => {
                let v = self.float_in_bounds(value, *low, *high)?;
                Ok((v.ln() - low.ln()) / (high.ln() - low.ln()))
            }
        }
    }

    /// Inverse of [`ParameterDef::to_unit`]; integer dimensions are rounded.
    pub fn from_unit(&self, u: f64) -> ParameterValue {
        let u = u.clamp(0.0, 1.0);
        match &self.kind {
            ParameterKind::FloatRange { low, high } => {
                ParameterValue::Float((low + u * (high - low)).clamp(*low, *high))
            }
            ParameterKind::IntRange { low, high } => {
                let v = (*low as f64 + u * (high - low) as f64).round() as i64;
                ParameterValue::Int(v.clamp(*low, *high))
            }
            ParameterKind::LogUniform { low, high } => {
                let log_val = low.ln() + u * (high.ln() - low.ln());
                ParameterValue::Float(log_val.exp().clamp(*low, *high))
            }
        }
    }

    fn float_in_bounds(&self, value: &ParameterValue, low: f64, high: f64) -> TbResult<f64> {
        let v = value
            .as_f64()
            .ok_or_else(|| self.invalid(format!("expected a number, got {value}")))?;
        if !(low..=high).contains(&v) {
            return Err(self.invalid(format!("{v} outside [{low}, {high}]")).into());
        }
        Ok(v)
    }
}

/// The full search space: an ordered list of parameter definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub parameters: Vec<ParameterDef>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
        }
    }

    /// The space searched for both estimator families.
    pub fn boosting() -> Self {
        Self::new()
            .add_log_uniform("learning_rate", 1e-4, 1.0)
            .add_int("n_estimators", 100, 3000)
            .add_int("num_leaves", 10, 400)
    }

    pub fn add_float(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::FloatRange { low, high },
        });
        self
    }

    pub fn add_int(mut self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::IntRange { low, high },
        });
        self
    }

    pub fn add_log_uniform(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::LogUniform { low, high },
        });
        self
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|p| p.name.as_str())
    }

    /// Non-empty, uniquely named, every dimension with valid bounds.
    pub fn validate(&self) -> TbResult<()> {
        if self.is_empty() {
            return Err(SearchError::EmptySpace.into());
        }
        let mut seen = HashSet::new();
        for param in &self.parameters {
            if !seen.insert(param.name.as_str()) {
                return Err(param.invalid("duplicate dimension name").into());
            }
            param.validate()?;
        }
        Ok(())
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> ParameterSet {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.sample(rng)))
            .collect()
    }

    /// Unit-cube coordinates of a point, in dimension order.
    ///
    /// Fails when a dimension is missing, out of bounds, or the point names a
    /// parameter the space does not define.
    pub fn to_unit(&self, point: &ParameterSet) -> TbResult<Vec<f64>> {
        if let Some(extra) = point.keys().find(|k| !self.names().any(|n| n == k.as_str())) {
            return Err(SearchError::InvalidDimension {
                name: extra.clone(),
                message: "not part of the search space".to_string(),
            }
            .into());
        }
        self.parameters
            .iter()
            .map(|p| {
                let value = point
                    .get(&p.name)
                    .ok_or_else(|| p.invalid("missing from point"))?;
                p.to_unit(value)
            })
            .collect()
    }

    pub fn from_unit(&self, unit: &[f64]) -> ParameterSet {
        self.parameters
            .iter()
            .zip(unit)
            .map(|(p, &u)| (p.name.clone(), p.from_unit(u)))
            .collect()
    }

    pub fn contains(&self, point: &ParameterSet) -> bool {
        self.to_unit(point).is_ok()
    }
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn boosting_space_has_fixed_dimensions() {
        let space = SearchSpace::boosting();
        assert_eq!(
            space.names().collect::<Vec<_>>(),
            vec!["learning_rate", "n_estimators", "num_leaves"]
        );
        space.validate().unwrap();
    }

    #[test]
    fn samples_respect_bounds() {
        let space = SearchSpace::boosting();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..200 {
            let point = space.sample(&mut rng);
            assert!(space.contains(&point), "{point:?}");
            assert!(matches!(point["n_estimators"], ParameterValue::Int(_)));
        }
    }

    #[test]
    fn log_dimension_maps_through_log_space() {
        let def = ParameterDef {
            name: "lr".into(),
            kind: ParameterKind::LogUniform { low: 1e-4, high: 1.0 },
        };
        let u = def.to_unit(&ParameterValue::Float(1e-2)).unwrap();
        assert!((u - 0.5).abs() < 1e-12);
        match def.from_unit(0.5) {
            ParameterValue::Float(v) => assert!((v - 1e-2).abs() < 1e-12),
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn unit_mapping_clamps_and_rounds_integers() {
        let space = SearchSpace::new().add_int("n", 10, 20);
        assert_eq!(space.from_unit(&[0.52])["n"], ParameterValue::Int(15));
        assert_eq!(space.from_unit(&[1.7])["n"], ParameterValue::Int(20));
    }

    #[test]
    fn rejects_points_outside_space() {
        let space = SearchSpace::boosting();
        let mut point = space.sample(&mut ChaCha8Rng::seed_from_u64(1));
        point.insert("num_leaves".into(), ParameterValue::Int(5000));
        assert!(!space.contains(&point));

        let mut extra = space.sample(&mut ChaCha8Rng::seed_from_u64(1));
        extra.insert("max_depth".into(), ParameterValue::Int(3));
        assert!(space.to_unit(&extra).is_err());

        let mut fractional = space.sample(&mut ChaCha8Rng::seed_from_u64(1));
        fractional.insert("n_estimators".into(), ParameterValue::Float(150.5));
        assert!(!space.contains(&fractional));
    }

    #[test]
    fn invalid_spaces_fail_validation() {
        assert!(SearchSpace::new().validate().is_err());
        assert!(SearchSpace::new().add_log_uniform("lr", 0.0, 1.0).validate().is_err());
        assert!(SearchSpace::new()
            .add_int("a", 1, 2)
            .add_int("a", 1, 3)
            .validate()
            .is_err());
    }
}
