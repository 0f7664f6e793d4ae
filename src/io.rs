//! On-disk formats: raw binary volumes and maps, CSV result tables, time axes

pub mod raw;
pub mod csv;

use std::fs;
use std::path::Path;

use crate::{Error, Result};
use crate::types::Time;
use crate::volume::time_axis_from_acquisition_times;

/// Read a time axis with one value per line; blank lines and lines starting
/// with `#` are skipped.
///
/// With `acquisition_times` the lines are `hhmmss.frac` clock times, which are
/// sorted and converted to seconds since the first one. Otherwise they are
/// seconds, shifted so that the first sample is at 0 as well.
pub fn read_time_axis(path: &Path, acquisition_times: bool) -> Result<Vec<Time>> {
    let text = fs::read_to_string(path)?;
    let lines: Vec<&str> = text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();
    if acquisition_times {
        return time_axis_from_acquisition_times(&lines);
    }
    let seconds = lines.iter()
        .map(|l| l.parse::<Time>().map_err(|e| Error::TimeAxis(format!("`{l}` in {}: {e}", path.display()))))
        .collect::<Result<Vec<_>>>()?;
    let first = seconds.first().copied().unwrap_or(0.0);
    Ok(seconds.into_iter().map(|t| t - first).collect())
}
