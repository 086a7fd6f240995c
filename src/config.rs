use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Changing the grid resolution invalidates every count computed so far, so this is fixed once a
/// session starts.
pub const DEFAULT_COLS: usize = 100;
pub const DEFAULT_ROWS: usize = 100;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sampling grid columns, across longitude
    pub cols: usize,
    /// Sampling grid rows, across latitude
    pub rows: usize,
    /// How far to extend a stroke past its endpoints, as a multiple of the boundary's bbox
    /// diagonal. The same distance is used for the far corners of each side's mask.
    pub extend_factor: f64,
    /// Relative slack allowed between the area of both sides and the boundary's area
    pub area_tolerance: f64,
    /// Threads used by the aggregation worker. None means one per core.
    pub worker_threads: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
            extend_factor: 3.0,
            area_tolerance: 0.001,
            worker_threads: None,
        }
    }
}

impl Config {
    /// Missing fields get their default values
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: &str) -> Result<Self> {
        let raw = fs_err::read_to_string(path)?;
        Self::from_json(&raw)
    }
}
