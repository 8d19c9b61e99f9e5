use std::fs;
use std::path::Path;

use arrow::array::{Array, Float64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::{Deserialize, Serialize};
use tb_types::{config_error, DataError, FeatureList, Table, TbError, TbResult};

/// On-disk table formats understood by [`TableLoader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableFormat {
    Csv,
    Parquet,
}

impl TableFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> TbResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => Ok(TableFormat::Csv),
            Some("parquet") | Some("pq") => Ok(TableFormat::Parquet),
            _ => Err(config_error!(
                "Unsupported table format for {}: expected .csv or .parquet",
                path.display()
            )),
        }
    }
}

/// Options controlling how a table file is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Column holding row labels. When absent rows are labelled `0..n`.
    pub index_column: Option<String>,
    /// CSV field delimiter.
    pub delimiter: u8,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            index_column: None,
            delimiter: b',',
        }
    }
}

impl LoadOptions {
    pub fn with_index_column(mut self, column: impl Into<String>) -> Self {
        self.index_column = Some(column.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

/// Reads sample tables from CSV or Parquet files.
#[derive(Debug, Clone, Default)]
pub struct TableLoader {
    options: LoadOptions,
}

impl TableLoader {
    pub fn new(options: LoadOptions) -> Self {
        Self { options }
    }

    /// Load a table, choosing the reader from the file extension.
    pub fn load<P: AsRef<Path>>(&self, path: P, name: &str) -> TbResult<Table> {
        let path = path.as_ref();
        match TableFormat::from_path(path)? {
            TableFormat::Csv => self.load_csv(path, name),
            TableFormat::Parquet => self.load_parquet(path, name),
        }
    }

    /// Load a CSV file with a header row. Empty cells become NaN.
    pub fn load_csv<P: AsRef<Path>>(&self, path: P, name: &str) -> TbResult<Table> {
        let path = path.as_ref();
        tracing::info!("Loading CSV table '{}' from: {}", name, path.display());

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.options.delimiter)
            .from_path(path)
            .map_err(|e| DataError::LoadingFailed {
                message: format!("Failed to open CSV file {}: {}", path.display(), e),
            })?;

        let headers = rdr
            .headers()
            .map_err(|e| DataError::LoadingFailed {
                message: format!("Failed to read CSV headers: {}", e),
            })?
            .clone();

        let index_pos = match &self.options.index_column {
            Some(col) => Some(headers.iter().position(|h| h == col).ok_or_else(|| {
                DataError::MissingColumn {
                    column: col.clone(),
                    table: name.to_string(),
                }
            })?),
            None => None,
        };

        let names: Vec<String> = headers.iter().map(str::to_string).collect();
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
        let mut index = Vec::new();

        for (line_num, result) in rdr.records().enumerate() {
            // Header occupies line 1.
            let line = line_num + 2;
            let record = result.map_err(|e| DataError::LoadingFailed {
                message: format!("Failed to read CSV record at line {}: {}", line, e),
            })?;

            for (pos, field) in record.iter().enumerate() {
                if Some(pos) == index_pos {
                    index.push(field.to_string());
                    continue;
                }
                columns[pos].push(parse_cell(field, &names[pos], line)?);
            }
            if index_pos.is_none() {
                index.push(line_num.to_string());
            }
        }

        let pairs = names
            .into_iter()
            .zip(columns)
            .enumerate()
            .filter(|(pos, _)| Some(*pos) != index_pos)
            .map(|(_, pair)| pair)
            .collect();

        let table = Table::from_columns(name, index, pairs)?;
        tracing::info!(
            "Loaded {} rows x {} columns from CSV file: {}",
            table.n_rows(),
            table.columns().len(),
            path.display()
        );
        Ok(table)
    }

    /// Load a Parquet file. Numeric columns are cast to `f64`; nulls become NaN.
    pub fn load_parquet<P: AsRef<Path>>(&self, path: P, name: &str) -> TbResult<Table> {
        let path = path.as_ref();
        tracing::info!("Loading Parquet table '{}' from: {}", name, path.display());

        if !path.exists() {
            return Err(DataError::LoadingFailed {
                message: format!("Parquet file not found: {}", path.display()),
            }
            .into());
        }

        let file = fs::File::open(path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| {
                TbError::Parquet(format!(
                    "Failed to create Parquet reader for {}: {}",
                    path.display(),
                    e
                ))
            })?
            .build()
            .map_err(|e| TbError::Parquet(format!("Failed to build Parquet reader: {}", e)))?;

        let mut names: Vec<String> = Vec::new();
        let mut columns: Vec<Vec<f64>> = Vec::new();
        let mut index: Vec<String> = Vec::new();

        for batch_result in reader {
            let batch = batch_result
                .map_err(|e| TbError::Arrow(format!("Failed to read Parquet batch: {}", e)))?;

            if names.is_empty() {
                names = batch
                    .schema()
                    .fields()
                    .iter()
                    .map(|f| f.name().clone())
                    .filter(|n| Some(n) != self.options.index_column.as_ref())
                    .collect();
                columns = vec![Vec::new(); names.len()];
            }

            self.append_batch(&batch, name, &names, &mut columns, &mut index)?;
        }

        let table = Table::from_columns(name, index, names.into_iter().zip(columns).collect())?;
        tracing::info!(
            "Loaded {} rows x {} columns from Parquet file: {}",
            table.n_rows(),
            table.columns().len(),
            path.display()
        );
        Ok(table)
    }

    fn append_batch(
        &self,
        batch: &RecordBatch,
        table: &str,
        names: &[String],
        columns: &mut [Vec<f64>],
        index: &mut Vec<String>,
    ) -> TbResult<()> {
        for (name, out) in names.iter().zip(columns.iter_mut()) {
            let array = batch.column_by_name(name).ok_or_else(|| unreadable(name))?;
            let floats = cast(array.as_ref(), &DataType::Float64).map_err(|e| DataError::InvalidFormat {
                message: format!("Column '{}' is not numeric: {}", name, e),
            })?;
            let floats = floats
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| unreadable(name))?;
            out.extend((0..floats.len()).map(|i| {
                if floats.is_null(i) {
                    f64::NAN
                } else {
                    floats.value(i)
                }
            }));
        }

        match &self.options.index_column {
            Some(col) => {
                let array = batch
                    .column_by_name(col)
                    .ok_or_else(|| DataError::MissingColumn {
                        column: col.clone(),
                        table: table.to_string(),
                    })?;
                let labels = cast(array.as_ref(), &DataType::Utf8)
                    .map_err(|e| TbError::Arrow(format!("Index column '{}': {}", col, e)))?;
                let labels = labels
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .ok_or_else(|| unreadable(col))?;
                index.extend((0..labels.len()).map(|i| labels.value(i).to_string()));
            }
            None => {
                let start = index.len();
                index.extend((start..start + batch.num_rows()).map(|i| i.to_string()));
            }
        }
        Ok(())
    }
}

fn unreadable(column: &str) -> DataError {
    DataError::InvalidFormat {
        message: format!("Unreadable column '{}' in Parquet file", column),
    }
}

fn parse_cell(field: &str, column: &str, line: usize) -> TbResult<f64> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(f64::NAN);
    }
    field.parse::<f64>().map_err(|e| {
        DataError::ParseError {
            message: format!(
                "Invalid number '{}' in column '{}' at line {}: {}",
                field, column, line, e
            ),
        }
        .into()
    })
}

/// Load a feature list stored as a JSON array of column names.
pub fn load_feature_list<P: AsRef<Path>>(path: P) -> TbResult<FeatureList> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)?;
    let features: Vec<String> = serde_json::from_str(&raw)?;
    tracing::debug!("Loaded {} features from {}", features.len(), path.display());
    FeatureList::new(features)
}

/// Convenience wrapper around [`TableLoader::load`].
pub fn load_table<P: AsRef<Path>>(path: P, name: &str, options: &LoadOptions) -> TbResult<Table> {
    TableLoader::new(options.clone()).load(path, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Int64Array};
    use arrow::datatypes::{Field, Schema};
    use parquet::arrow::ArrowWriter;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::{Builder, TempDir};

    #[test]
    fn test_csv_loading_with_index() {
        let mut temp_file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(temp_file, "task_id,x1,x2,target").unwrap();
        writeln!(temp_file, "a,1.5,10,0").unwrap();
        writeln!(temp_file, "b,2.5,,1").unwrap();
        temp_file.flush().unwrap();

        let options = LoadOptions::default().with_index_column("task_id");
        let table = load_table(temp_file.path(), "train", &options).unwrap();

        assert_eq!(table.index(), &["a".to_string(), "b".to_string()]);
        assert_eq!(table.columns(), &["x1", "x2", "target"]);
        assert_eq!(table.column("x1").unwrap(), &[1.5, 2.5]);
        assert!(table.column("x2").unwrap()[1].is_nan());
    }

    #[test]
    fn test_csv_rejects_text_cells() {
        let mut temp_file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(temp_file, "x1,target").unwrap();
        writeln!(temp_file, "oops,1").unwrap();
        temp_file.flush().unwrap();

        let err = load_table(temp_file.path(), "train", &LoadOptions::default()).unwrap_err();
        match err {
            TbError::Data(DataError::ParseError { message }) => {
                assert!(message.contains("line 2"), "{message}");
            }
            other => panic!("Expected ParseError, got: {:?}", other),
        }
    }

    #[test]
    fn test_parquet_loading() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("train.parquet");

        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("x1", DataType::Float64, true),
            Field::new("label", DataType::Int64, false),
        ]));
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from(vec![7, 8, 9])),
            Arc::new(Float64Array::from(vec![Some(0.5), None, Some(1.5)])),
            Arc::new(Int64Array::from(vec![0, 1, 1])),
        ];
        let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();
        let file = fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let options = LoadOptions::default().with_index_column("id");
        let table = load_table(&path, "train", &options).unwrap();

        assert_eq!(table.index(), &["7", "8", "9"]);
        assert_eq!(table.column("label").unwrap(), &[0.0, 1.0, 1.0]);
        assert!(table.column("x1").unwrap()[1].is_nan());
        assert!(!table.has_column("id"));
    }

    #[test]
    fn test_parquet_loading_nonexistent_file() {
        let result = load_table("/path/that/does/not/exist.parquet", "test", &LoadOptions::default());
        assert!(matches!(
            result,
            Err(TbError::Data(DataError::LoadingFailed { .. }))
        ));
    }

    #[test]
    fn test_unknown_extension_is_config_error() {
        let result = load_table("samples.pkl", "train", &LoadOptions::default());
        assert!(matches!(result, Err(TbError::Config(_))));
    }

    #[test]
    fn test_feature_list_artifact() {
        let mut temp_file = Builder::new().suffix(".json").tempfile().unwrap();
        write!(temp_file, r#"["density", "band_gap"]"#).unwrap();
        temp_file.flush().unwrap();

        let features = load_feature_list(temp_file.path()).unwrap();
        assert_eq!(features.as_slice(), &["density", "band_gap"]);
    }
}
