use grid_poster::config::snap;
use grid_poster::grid::{GridCalibrator, GridSnapper};
use grid_poster::image::io::{load_rgba_image, save_rgba_png, write_json_file};
use grid_poster::MapFileName;
use serde::Serialize;
use std::env;
use std::path::Path;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn usage() -> String {
    "Usage: snap_demo <config.json>".to_string()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapDemoReport<'a> {
    calibration: &'a grid_poster::grid::Calibration,
    snap: grid_poster::diagnostics::SnapSummary,
    output: String,
}

fn run() -> Result<(), String> {
    let config_path = env::args().nth(1).ok_or_else(usage)?;
    let config = snap::load_config(Path::new(&config_path))?;

    let image = load_rgba_image(&config.input)?;
    let calibration = GridCalibrator::new(config.calibration.clone())
        .calibrate(&config.clicks(), image.w, image.h)
        .map_err(|e| e.to_string())?;
    if calibration.exceeds_tolerance() {
        eprintln!(
            "Warning: grid residual {:.3} cells exceeds {:.3}",
            calibration.residual, calibration.tolerance
        );
    }
    let rect = GridSnapper::new(config.snap.clone())
        .snap(&image, &calibration.grid)
        .map_err(|e| e.to_string())?;

    let stem = config
        .output
        .name
        .clone()
        .or_else(|| {
            config
                .input
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|s| match MapFileName::parse(&format!("{s}.png")) {
                    Ok(parsed) => parsed.name,
                    Err(_) => s.to_string(),
                })
        })
        .unwrap_or_else(|| "map".to_string());
    let file = MapFileName::new(stem, rect.cols() as f32, rect.rows() as f32).file_name();
    let out_path = config.output.dir.join(&file);
    save_rgba_png(rect.image(), &out_path)?;
    println!(
        "Snapped {}x{} cells ({}px each) to {}",
        rect.cols(),
        rect.rows(),
        rect.cell_px(),
        out_path.display()
    );

    if let Some(path) = &config.output.json_out {
        let report = SnapDemoReport {
            calibration: &calibration,
            snap: (&rect).into(),
            output: file,
        };
        write_json_file(path, &report)?;
        println!("JSON report written to {}", path.display());
    }
    Ok(())
}
