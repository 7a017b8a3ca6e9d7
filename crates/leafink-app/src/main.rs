//! Main application entry point.
//!
//! Usage: `leafink [CONFIG] [OUT_DIR]`. The config path may also come from
//! `LEAFINK_CONFIG`; exports are only written when `OUT_DIR` is given.

use leafink_app::{AppError, demo};
use leafink_core::EditorConfig;
use std::path::PathBuf;

fn main() {
    env_logger::init();
    log::info!("Starting LeafInk");

    if let Err(e) = run() {
        log::error!("{e}");
        eprintln!("leafink: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("LEAFINK_CONFIG").map(PathBuf::from));
    let out_dir = args.next().map(PathBuf::from);

    let config = match config_path {
        Some(path) => {
            log::info!("Loading config from {}", path.display());
            EditorConfig::load(&path)?
        }
        None => EditorConfig::default(),
    };

    let report = demo::run(&config, out_dir.as_deref())?;
    for page in &report.pages {
        println!(
            "{}: {} objects [{}], {} history entries",
            page.client,
            page.objects.len(),
            page.objects.join(", "),
            page.history
        );
    }
    for (name, size) in &report.downloads {
        println!("exported {name} ({size} bytes)");
    }
    println!("store writes: {}", report.writes);
    println!("converged: {}", report.converged);
    println!("{}", serde_json::to_string_pretty(&report.snapshot)?);
    Ok(())
}
