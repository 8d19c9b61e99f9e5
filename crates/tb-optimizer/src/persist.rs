//! Saving and reloading search state.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use tb_types::TbResult;
use tracing::info;

use crate::trial::SearchOutcome;

/// File name of the search state for a target column.
pub fn state_file_name(target: &str) -> String {
    let safe: String = target
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("optimization_data_{safe}.json")
}

/// Write `outcome` under `dir`, creating the directory if needed.
pub fn save_outcome(dir: &Path, target: &str, outcome: &SearchOutcome) -> TbResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(state_file_name(target));
    let writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(writer, outcome)?;
    info!("Saved search state to {}", path.display());
    Ok(path)
}

pub fn load_outcome(path: &Path) -> TbResult<SearchOutcome> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}
