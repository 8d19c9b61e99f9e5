//! Min-max feature scaling fitted on the training table only.

use serde::{Deserialize, Serialize};
use tb_types::{validation_error, DataError, FeatureList, Table, TbResult};

/// Per-feature min-max scaler.
///
/// Columns with zero range in the fitted table map to the lower bound of the
/// output range. With `clip` enabled, values outside the fitted range (which
/// can only occur in tables other than the one used for fitting) are clamped
/// into the output range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    features: FeatureList,
    feature_range: (f64, f64),
    clip: bool,
    data_min: Vec<f64>,
    data_max: Vec<f64>,
}

impl MinMaxScaler {
    /// Fit on the given feature columns of `table`.
    pub fn fit(table: &Table, features: &FeatureList) -> TbResult<Self> {
        Self::fit_with_range(table, features, (0.0, 1.0), true)
    }

    pub fn fit_with_range(
        table: &Table,
        features: &FeatureList,
        feature_range: (f64, f64),
        clip: bool,
    ) -> TbResult<Self> {
        if feature_range.0 >= feature_range.1 {
            return Err(validation_error!(
                "Minimum of feature range must be smaller than maximum, got {:?}",
                feature_range
            ));
        }
        if table.is_empty() {
            return Err(DataError::EmptyTable {
                table: table.name().to_string(),
            }
            .into());
        }

        let mut data_min = Vec::with_capacity(features.len());
        let mut data_max = Vec::with_capacity(features.len());
        for feature in features.iter() {
            let values = table.require_column(feature)?;
            let (lo, hi) = values
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                });
            data_min.push(lo);
            data_max.push(hi);
        }

        tracing::debug!(
            "Fitted min-max scaler on {} features of '{}'",
            features.len(),
            table.name()
        );

        Ok(Self {
            features: features.clone(),
            feature_range,
            clip,
            data_min,
            data_max,
        })
    }

    pub fn features(&self) -> &FeatureList {
        &self.features
    }

    pub fn data_min(&self) -> &[f64] {
        &self.data_min
    }

    pub fn data_max(&self) -> &[f64] {
        &self.data_max
    }

    /// Scale the fitted feature columns of `table` in place.
    pub fn transform(&self, table: &mut Table) -> TbResult<()> {
        let (out_lo, out_hi) = self.feature_range;
        for (i, feature) in self.features.iter().enumerate() {
            let range = self.data_max[i] - self.data_min[i];
            let scale = if range > 0.0 {
                (out_hi - out_lo) / range
            } else {
                1.0
            };
            let min = self.data_min[i];

            let scaled: Vec<f64> = table
                .require_column(feature)?
                .iter()
                .map(|&v| {
                    let s = out_lo + (v - min) * scale;
                    if self.clip {
                        s.clamp(out_lo, out_hi)
                    } else {
                        s
                    }
                })
                .collect();
            table.replace_column(feature, scaled)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, x: Vec<f64>, c: Vec<f64>) -> Table {
        Table::with_default_index(name, vec![("x".into(), x), ("c".into(), c)]).unwrap()
    }

    fn features() -> FeatureList {
        FeatureList::new(vec!["x".into(), "c".into()]).unwrap()
    }

    #[test]
    fn scales_train_into_unit_range() {
        let mut train = table("train", vec![2.0, 4.0, 6.0], vec![5.0, 5.0, 5.0]);
        let scaler = MinMaxScaler::fit(&train, &features()).unwrap();
        scaler.transform(&mut train).unwrap();

        assert_eq!(train.column("x").unwrap(), &[0.0, 0.5, 1.0]);
        // Constant column collapses to the lower bound.
        assert_eq!(train.column("c").unwrap(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn clips_test_values_outside_train_range() {
        let train = table("train", vec![0.0, 10.0], vec![1.0, 2.0]);
        let mut test = table("test", vec![-5.0, 5.0, 20.0], vec![1.5, 1.5, 3.0]);
        let scaler = MinMaxScaler::fit(&train, &features()).unwrap();
        scaler.transform(&mut test).unwrap();

        assert_eq!(test.column("x").unwrap(), &[0.0, 0.5, 1.0]);
        assert_eq!(test.column("c").unwrap(), &[0.5, 0.5, 1.0]);
    }

    #[test]
    fn unclipped_scaler_extrapolates() {
        let train = table("train", vec![0.0, 10.0], vec![1.0, 2.0]);
        let mut test = table("test", vec![20.0], vec![1.0]);
        let scaler = MinMaxScaler::fit_with_range(&train, &features(), (0.0, 1.0), false).unwrap();
        scaler.transform(&mut test).unwrap();
        assert_eq!(test.column("x").unwrap(), &[2.0]);
    }

    #[test]
    fn rejects_inverted_range() {
        let train = table("train", vec![0.0], vec![1.0]);
        assert!(MinMaxScaler::fit_with_range(&train, &features(), (1.0, 0.0), true).is_err());
    }
}
