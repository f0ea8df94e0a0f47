use grid_poster::config::batch;
use grid_poster::export::{ExportMode, MapExporter, NearestUpscale, PngDirectoryAssembler};
use grid_poster::image::io::load_rgba_image;
use grid_poster::poster::LayoutMode;
use grid_poster::MapFileName;
use log::{debug, info, warn};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn usage() -> String {
    "Usage: batch_demo <config.json> [preset]".to_string()
}

/// Output stem suffix, so runs in different modes do not collide.
fn mode_tag(mode: &ExportMode) -> &'static str {
    match mode {
        ExportMode::Vtt => "vtt",
        ExportMode::Exact { .. } => "exact",
        ExportMode::Print {
            layout: LayoutMode::Tiled,
            ..
        } => "tiled",
        ExportMode::Print {
            layout: LayoutMode::SingleSheet,
            ..
        } => "sheet",
    }
}

fn run() -> Result<(), String> {
    let mut args = env::args().skip(1);
    let config_path = args.next().ok_or_else(usage)?;
    let preset = args.next();
    let mut config = batch::load_config(Path::new(&config_path))?;
    config.apply_preset(preset.as_deref())?;
    let out_dir = config.output_dir().to_path_buf();

    let mut inputs: Vec<PathBuf> = fs::read_dir(&config.input_dir)
        .map_err(|e| format!("Failed to list {}: {e}", config.input_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    inputs.sort();

    let mut exporter = MapExporter::new(config.params.clone());
    if config.params.upscale_factor > 1 {
        exporter = exporter.with_upscaler(Box::new(NearestUpscale));
    }
    let tag = mode_tag(&config.mode);

    let (mut written, mut skipped, mut failed) = (0usize, 0usize, 0usize);
    for path in &inputs {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let map = match MapFileName::parse(file_name) {
            Ok(map) => map,
            Err(err) => {
                debug!("skipping {file_name}: {err}");
                continue;
            }
        };
        let Some((cols, rows)) = map.cells() else {
            warn!("skipping {file_name}: cell counts must be whole numbers");
            continue;
        };

        let mut assembler = PngDirectoryAssembler::new(&out_dir, format!("{}_{tag}", map.name));
        if !config.overwrite && assembler.manifest_path().is_file() {
            info!(
                "{} already exists, skipping",
                assembler.manifest_path().display()
            );
            skipped += 1;
            continue;
        }

        info!("processing {}: {cols}x{rows} cells, mode={tag}", map.name);
        let result = load_rgba_image(path).and_then(|image| {
            let export = exporter
                .export_snapped(&image, cols, rows, &config.mode)
                .map_err(|e| e.to_string())?;
            exporter
                .deliver(export, &mut assembler)
                .map_err(|e| e.to_string())
        });
        match result {
            Ok(report) => {
                println!(
                    "  {file_name}: {} page(s), {:.3} px/mm, {:.1} ms",
                    report.pages.len().max(1),
                    report.pixels_per_mm,
                    report.timing.total_ms
                );
                written += 1;
            }
            Err(err) => {
                warn!("{file_name}: {err}");
                failed += 1;
            }
        }
    }

    println!(
        "Batch export to {}: {written} written, {skipped} skipped, {failed} failed",
        out_dir.display()
    );
    if failed > 0 {
        return Err(format!("{failed} map(s) failed to export"));
    }
    Ok(())
}
