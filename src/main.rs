use anyhow::Context;
use env_logger::Builder;
use log::{LevelFilter, info};
use std::path::PathBuf;

use lora_mesh_simulator::{SimulatorConfig, run};

fn main() -> anyhow::Result<()> {
    // Logging setup
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some("lora_mesh_simulator"), LevelFilter::Debug)
        .init();

    info!("Starting up");

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            SimulatorConfig::load(&path).with_context(|| format!("Cannot use {}", path.display()))?
        }
        None => {
            info!("No configuration file given, using defaults");
            SimulatorConfig::default()
        }
    };

    let summary = run(&config)?;
    println!("{}", serde_json::to_string_pretty(&summary).context("Failed to serialize run summary")?);
    Ok(())
}
