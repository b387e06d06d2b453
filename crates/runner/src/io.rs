//! Result snapshot I/O.
//!
//! A completed run is written as pretty-printed JSON under the configured
//! output directory: one file per run id plus a `latest.json` convenience
//! copy for tooling that only cares about the most recent run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::BenchmarkRun;

/// File name of the most-recent-run copy.
pub const LATEST_FILE: &str = "latest.json";

/// Write a run snapshot, returning the per-run file path.
pub fn write_snapshot(run: &BenchmarkRun, output_dir: impl AsRef<Path>) -> io::Result<PathBuf> {
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir)?;

    let json = serde_json::to_string_pretty(run)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    let path = output_dir.join(format!("{}.json", run.run_id));
    fs::write(&path, &json)?;
    fs::write(output_dir.join(LATEST_FILE), &json)?;
    Ok(path)
}

/// Read a run snapshot back from disk.
pub fn read_snapshot(path: impl AsRef<Path>) -> io::Result<BenchmarkRun> {
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}
