//! Flatland - 2D level simulation
//!
//! Loads the configured level, runs it for a fixed number of frames and
//! optionally saves the result.

use std::process::ExitCode;

use flatland::config::AppConfig;
use flatland::systems::SimulationSystem;
use flatland_core::Level;

fn main() -> ExitCode {
    let (config, config_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.debug.log_level.as_str()),
    )
    .init();
    log::info!("Starting Flatland");
    if let Some(e) = config_error {
        log::warn!("Failed to load config: {}. Using defaults.", e);
    }

    let mut level = Level::new();
    let summary = match level.load(&config.level.path) {
        Ok(summary) => summary,
        Err(e) => {
            log::error!("Failed to load level {}: {}", config.level.path, e);
            return ExitCode::FAILURE;
        }
    };
    if summary.failed_callbacks > 0 {
        log::warn!(
            "{} objects in '{}' failed their post-load check",
            summary.failed_callbacks,
            summary.name
        );
    }

    let mut simulation = SimulationSystem::new(config.simulation.timestep);
    let report = simulation.run(&mut level, config.simulation.frames);
    log::info!(
        "Ran {} frames: {} objects left (peak {}), {} draw commands in the last frame",
        report.frames,
        report.final_objects,
        report.peak_objects,
        report.draw_commands
    );
    if config.debug.log_query_stats {
        let queries = report.queries;
        log::info!(
            "Queries: {} collide, {} intersect, {} overlap, {} saturated",
            queries.collide_queries,
            queries.intersect_queries,
            queries.overlap_queries,
            queries.saturated_queries
        );
    }

    if let Some(save_path) = &config.level.save_path {
        if let Err(e) = level.save(save_path) {
            log::error!("Failed to save level to {}: {}", save_path, e);
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}
