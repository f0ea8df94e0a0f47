use super::preset::{apply_named, Preset};
use crate::export::{ExportMode, ExportParams};
use crate::types::Point;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct PosterDemoConfig {
    pub input: PathBuf,
    /// Reference square, its width neighbour, its height neighbour.
    pub points: Vec<[f32; 2]>,
    #[serde(default)]
    pub params: ExportParams,
    #[serde(default)]
    pub mode: ExportMode,
    #[serde(default)]
    pub presets: BTreeMap<String, Preset>,
    /// Preset applied on load, unless the command line names another.
    #[serde(default)]
    pub preset: Option<String>,
    pub output: PosterOutputConfig,
}

impl PosterDemoConfig {
    pub fn clicks(&self) -> Vec<Point> {
        points_from(&self.points)
    }

    /// Apply `name`, or the configured preset when `name` is `None`.
    pub fn apply_preset(&mut self, name: Option<&str>) -> Result<(), String> {
        match name.or(self.preset.as_deref()) {
            Some(name) => apply_named(&self.presets, name, &mut self.params, &mut self.mode),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PosterOutputConfig {
    pub dir: PathBuf,
    /// File stem for pages; defaults to the input file stem.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub report_json: Option<PathBuf>,
}

pub(crate) fn points_from(raw: &[[f32; 2]]) -> Vec<Point> {
    raw.iter().map(|&[x, y]| Point::new(x, y)).collect()
}

pub fn load_config(path: &Path) -> Result<PosterDemoConfig, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    let config: PosterDemoConfig = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))?;
    if config.points.len() < 3 {
        return Err(format!(
            "Config {} needs three points, found {}",
            path.display(),
            config.points.len()
        ));
    }
    Ok(config)
}
