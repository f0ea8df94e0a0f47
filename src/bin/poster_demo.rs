use grid_poster::config::export;
use grid_poster::export::{MapExporter, NearestUpscale, PngDirectoryAssembler};
use grid_poster::image::io::{load_rgba_image, write_json_file};
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
    "Usage: poster_demo <config.json> [preset]".to_string()
}

fn run() -> Result<(), String> {
    let mut args = env::args().skip(1);
    let config_path = args.next().ok_or_else(usage)?;
    let mut config = export::load_config(Path::new(&config_path))?;
    config.apply_preset(args.next().as_deref())?;

    let image = load_rgba_image(&config.input)?;
    let name = config
        .output
        .name
        .clone()
        .or_else(|| {
            config
                .input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "map".to_string());

    let mut exporter = MapExporter::new(config.params.clone());
    if config.params.upscale_factor > 1 {
        exporter = exporter.with_upscaler(Box::new(NearestUpscale));
    }
    let mut assembler = PngDirectoryAssembler::new(&config.output.dir, name);
    let report = exporter
        .export_to(&image, &config.clicks(), &config.mode, &mut assembler)
        .map_err(|e| e.to_string())?;

    let cal = &report.calibration;
    println!("Poster export summary");
    println!("  input: {}x{}", report.input.width, report.input.height);
    println!(
        "  grid: {}x{} cells, origin ({:.1}, {:.1}), cell {:.2}px, residual {:.3}{}",
        cal.grid.cols(),
        cal.grid.rows(),
        cal.grid.origin().x,
        cal.grid.origin().y,
        cal.grid.cell_size(),
        cal.residual,
        if cal.exceeds_tolerance() { " (check clicks)" } else { "" }
    );
    println!(
        "  snapped: {}x{} px, {}px cells{}",
        report.snap.width,
        report.snap.height,
        report.snap.cell_px,
        if report.snap.resampled { ", resampled" } else { "" }
    );
    println!("  resolution: {:.3} px/mm", report.pixels_per_mm);
    if let Some(plan) = &report.plan {
        println!(
            "  pages: {} ({} cols x {} rows, {:?})",
            plan.len(),
            plan.cols,
            plan.rows,
            plan.orientation
        );
    }
    println!("  total: {:.1} ms", report.timing.total_ms);
    for path in assembler.written() {
        println!("  wrote {}", path.display());
    }

    if let Some(path) = &config.output.report_json {
        write_json_file(path, &report)?;
        println!("JSON report written to {}", path.display());
    }
    Ok(())
}
