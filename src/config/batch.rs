use super::preset::{apply_named, Preset};
use crate::export::{ExportMode, ExportParams};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Batch export of every `name_WWxHH.png` map in a directory.
#[derive(Debug, Deserialize)]
pub struct BatchDemoConfig {
    pub input_dir: PathBuf,
    /// Defaults to `input_dir`.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub params: ExportParams,
    #[serde(default)]
    pub mode: ExportMode,
    #[serde(default)]
    pub presets: BTreeMap<String, Preset>,
    #[serde(default)]
    pub preset: Option<String>,
    /// Re-export maps whose page manifest already exists.
    #[serde(default)]
    pub overwrite: bool,
}

impl BatchDemoConfig {
    pub fn output_dir(&self) -> &Path {
        self.output_dir.as_deref().unwrap_or(&self.input_dir)
    }

    pub fn apply_preset(&mut self, name: Option<&str>) -> Result<(), String> {
        match name.or(self.preset.as_deref()) {
            Some(name) => apply_named(&self.presets, name, &mut self.params, &mut self.mode),
            None => Ok(()),
        }
    }
}

pub fn load_config(path: &Path) -> Result<BatchDemoConfig, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    let config: BatchDemoConfig = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))?;
    if !config.input_dir.is_dir() {
        return Err(format!(
            "Input directory {} not found",
            config.input_dir.display()
        ));
    }
    Ok(config)
}
