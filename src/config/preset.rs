//! Named setting bundles (e.g. `"library"`, `"table"`) that override the
//! tone, paper and mode of a run.
use crate::export::{ExportMode, ExportParams};
use crate::poster::{LayoutMode, PageSpec, Paper};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetMode {
    /// Glue-together pages of the preset's paper.
    Tiled,
    /// One page fitted to the map plus its border.
    Exact,
    Vtt,
}

/// Every field is optional; unset fields keep the config's own value.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Preset {
    pub mode: Option<PresetMode>,
    pub paper: Option<Paper>,
    /// Page margin, also the border of an exact page.
    pub border_mm: Option<f32>,
    pub overlap_mm: Option<f32>,
    pub brighten: Option<f32>,
    pub sharpen: Option<f32>,
    pub saturation: Option<f32>,
    pub upscale_factor: Option<u32>,
}

impl Preset {
    pub fn apply(&self, params: &mut ExportParams, mode: &mut ExportMode) {
        let tone = &mut params.tone;
        tone.brighten = self.brighten.or(tone.brighten);
        tone.sharpen = self.sharpen.or(tone.sharpen);
        tone.saturation = self.saturation.or(tone.saturation);
        if let Some(factor) = self.upscale_factor {
            params.upscale_factor = factor;
        }

        let (mut page, layout) = match mode {
            ExportMode::Print { page, layout } => (*page, *layout),
            _ => (PageSpec::default(), LayoutMode::Tiled),
        };
        if let Some(paper) = self.paper {
            let (w, h) = paper.size_mm();
            page.width_mm = w;
            page.height_mm = h;
        }
        if let Some(border) = self.border_mm {
            page.margin_mm = border;
        }
        if let Some(overlap) = self.overlap_mm {
            page.overlap_mm = overlap;
        }

        let kind = self.mode.unwrap_or(match mode {
            ExportMode::Vtt => PresetMode::Vtt,
            ExportMode::Print { .. } => PresetMode::Tiled,
            ExportMode::Exact { .. } => PresetMode::Exact,
        });
        let exact_margin = match (self.border_mm, &*mode) {
            (Some(border), _) => border,
            (None, ExportMode::Exact { margin_mm }) => *margin_mm,
            (None, _) => page.margin_mm,
        };
        *mode = match kind {
            PresetMode::Tiled => ExportMode::Print { page, layout },
            PresetMode::Exact => ExportMode::Exact {
                margin_mm: exact_margin,
            },
            PresetMode::Vtt => ExportMode::Vtt,
        };
    }
}

/// Apply preset `name` from `presets`, or fail listing the known names.
pub fn apply_named(
    presets: &BTreeMap<String, Preset>,
    name: &str,
    params: &mut ExportParams,
    mode: &mut ExportMode,
) -> Result<(), String> {
    let preset = presets.get(name).ok_or_else(|| {
        let known: Vec<&str> = presets.keys().map(String::as_str).collect();
        format!("Unknown preset '{name}', available presets are [{}]", known.join("|"))
    })?;
    log::info!("applying preset '{name}'");
    preset.apply(params, mode);
    Ok(())
}
