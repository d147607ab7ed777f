//! depot runtime
//!
//! Scans a project directory for asset containers, registers their headers,
//! loads every payload on the worker pool and reports the outcome.
//!
//! Run with: cargo run -p depot_runtime -- <project-root>
//!       or: DEPOT_PROJECT=game/content cargo run --bin depot

mod boot_config;

use std::collections::BTreeMap;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use boot_config::BootConfig;
use depot_asset::{wait_result, AssetManager, AssetResult};

/// Outcome of one scan-and-load pass
#[derive(Debug, Default)]
struct Report {
    discovered: usize,
    loaded: usize,
    failed: usize,
    /// Loaded payloads per class name
    by_class: BTreeMap<String, usize>,
    elapsed: Duration,
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Panics are reported through the log before the default unwind
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("PANIC: {}", panic_info);
    }));

    let config = match BootConfig::load(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    log::info!(
        "Project root: {} (extension .{})",
        config.assets.project_root.display(),
        config.assets.container_extension
    );

    match run(&config) {
        Ok(report) => {
            print_report(&report);
            if report.failed == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: &BootConfig) -> AssetResult<Report> {
    let start = Instant::now();
    let manager = AssetManager::new(config.assets.clone())?;

    let mut report = Report {
        discovered: manager.scan_project()?,
        ..Report::default()
    };

    if config.load_all {
        for (handle, task) in manager.load_all() {
            match wait_result(task) {
                Ok(()) => {
                    report.loaded += 1;
                    if let Some(class) = manager.get_asset(handle).and_then(|a| a.payload_class()) {
                        *report.by_class.entry(class).or_default() += 1;
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    log::warn!("Asset {} failed to load: {}", handle, e);
                }
            }
        }
    }

    for event in manager.drain_events() {
        log::debug!("{:?}", event);
    }

    report.elapsed = start.elapsed();
    Ok(report)
}

fn print_report(report: &Report) {
    log::info!(
        "Discovered {} assets, loaded {}, failed {} in {:.1?}",
        report.discovered,
        report.loaded,
        report.failed,
        report.elapsed
    );
    for (class, count) in &report.by_class {
        log::info!("  {:<12} {}", class, count);
    }
}
