use super::export::points_from;
use crate::grid::{CalibrationParams, SnapParams};
use crate::types::Point;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct SnapDemoConfig {
    pub input: PathBuf,
    pub points: Vec<[f32; 2]>,
    #[serde(default)]
    pub calibration: CalibrationParams,
    #[serde(default)]
    pub snap: SnapParams,
    pub output: SnapOutputConfig,
}

impl SnapDemoConfig {
    pub fn clicks(&self) -> Vec<Point> {
        points_from(&self.points)
    }
}

#[derive(Debug, Deserialize)]
pub struct SnapOutputConfig {
    /// Directory receiving `<name>_<cols>x<rows>.png`.
    pub dir: PathBuf,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub json_out: Option<PathBuf>,
}

pub fn load_config(path: &Path) -> Result<SnapDemoConfig, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    let config: SnapDemoConfig = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))?;
    Ok(config)
}
