//! Column-oriented sample tables and the dense matrices handed to models.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::errors::{DataError, TbResult};

/// A named table of `f64` columns with a row index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    name: String,
    index: Vec<String>,
    columns: Vec<String>,
    values: HashMap<String, Vec<f64>>,
}

impl Table {
    /// Build a table from ordered `(column, values)` pairs.
    ///
    /// Every column must have one value per index entry and column names must
    /// be unique.
    pub fn from_columns(
        name: impl Into<String>,
        index: Vec<String>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> TbResult<Self> {
        let mut table = Self {
            name: name.into(),
            index,
            columns: Vec::with_capacity(columns.len()),
            values: HashMap::with_capacity(columns.len()),
        };
        for (column, values) in columns {
            if table.values.contains_key(&column) {
                return Err(DataError::DuplicateColumn { column }.into());
            }
            table.check_length(&column, values.len())?;
            table.columns.push(column.clone());
            table.values.insert(column, values);
        }
        Ok(table)
    }

    /// Same as [`Table::from_columns`] with a positional `0..n` index.
    pub fn with_default_index(
        name: impl Into<String>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> TbResult<Self> {
        let rows = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
        let index = (0..rows).map(|i| i.to_string()).collect();
        Self::from_columns(name, index, columns)
    }

    fn check_length(&self, column: &str, len: usize) -> TbResult<()> {
        if len != self.index.len() {
            return Err(DataError::LengthMismatch {
                column: column.to_string(),
                expected: self.index.len(),
                actual: len,
            }
            .into());
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[String] {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn column(&self, column: &str) -> Option<&[f64]> {
        self.values.get(column).map(Vec::as_slice)
    }

    /// Look up a column, failing with a schema error naming this table.
    pub fn require_column(&self, column: &str) -> TbResult<&[f64]> {
        self.column(column).ok_or_else(|| {
            DataError::MissingColumn {
                column: column.to_string(),
                table: self.name.clone(),
            }
            .into()
        })
    }

    /// Replace the values of an existing column, keeping its position.
    pub fn replace_column(&mut self, column: &str, values: Vec<f64>) -> TbResult<()> {
        self.check_length(column, values.len())?;
        match self.values.get_mut(column) {
            Some(slot) => {
                *slot = values;
                Ok(())
            }
            None => Err(DataError::MissingColumn {
                column: column.to_string(),
                table: self.name.clone(),
            }
            .into()),
        }
    }

    /// Gather the given features into a matrix, one column per feature.
    pub fn feature_matrix(&self, features: &FeatureList) -> TbResult<FeatureMatrix> {
        let cols: Vec<&[f64]> = features
            .iter()
            .map(|f| self.require_column(f))
            .collect::<TbResult<_>>()?;

        let data = Array2::from_shape_fn((self.n_rows(), cols.len()), |(row, col)| cols[col][row]);
        Ok(FeatureMatrix { data })
    }

    /// Copy of the target column values (no index).
    pub fn target(&self, column: &str) -> TbResult<Vec<f64>> {
        Ok(self.require_column(column)?.to_vec())
    }
}

/// Ordered, unique, non-empty list of feature column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FeatureList(Vec<String>);

impl FeatureList {
    pub fn new(features: Vec<String>) -> TbResult<Self> {
        if features.is_empty() {
            return Err(DataError::EmptyFeatureList.into());
        }
        let mut seen = HashSet::with_capacity(features.len());
        for feature in &features {
            if !seen.insert(feature.as_str()) {
                return Err(DataError::DuplicateFeature {
                    feature: feature.clone(),
                }
                .into());
            }
        }
        Ok(Self(features))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Fail if any feature is missing from `table`.
    pub fn check_against(&self, table: &Table) -> TbResult<()> {
        for feature in &self.0 {
            table.require_column(feature)?;
        }
        Ok(())
    }
}

impl TryFrom<Vec<String>> for FeatureList {
    type Error = crate::errors::TbError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FeatureList> for Vec<String> {
    fn from(value: FeatureList) -> Self {
        value.0
    }
}

/// Dense feature matrix, rows are samples.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    data: Array2<f64>,
}

impl FeatureMatrix {
    /// Build from equally sized rows.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> TbResult<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(Vec::len).unwrap_or(0);
        let mut flat = Vec::with_capacity(n_rows * n_cols);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n_cols {
                return Err(DataError::LengthMismatch {
                    column: format!("row {i}"),
                    expected: n_cols,
                    actual: row.len(),
                }
                .into());
            }
            flat.extend(row);
        }
        let data = Array2::from_shape_vec((n_rows, n_cols), flat)
            .map_err(|e| DataError::InvalidFormat {
                message: e.to_string(),
            })?;
        Ok(Self { data })
    }

    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_cols(&self) -> usize {
        self.data.ncols()
    }

    #[inline]
    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.data.row(i)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[[row, col]]
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    /// Row-major copy of the values, for native libraries taking flat buffers.
    pub fn to_row_major_vec(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }

    /// New matrix holding the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> FeatureMatrix {
        FeatureMatrix {
            data: self.data.select(Axis(0), rows),
        }
    }
}

impl From<Array2<f64>> for FeatureMatrix {
    fn from(data: Array2<f64>) -> Self {
        Self { data }
    }
}
