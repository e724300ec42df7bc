//! `fishlaunch` command-line front end.

mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use fishlaunch::logging::{LogOptions, init_logging};
use fishlaunch::{FileSettingsStore, LauncherService, SettingsStore};
use fishlaunch_platform::AppPaths;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let paths = match AppPaths::new() {
        Ok(paths) => paths,
        Err(error) => {
            eprintln!("fishlaunch: {error}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(error) = paths.ensure_dirs() {
        eprintln!("fishlaunch: cannot create application directories: {error}");
    }

    let store = Arc::new(FileSettingsStore::from_paths(&paths));
    let stored = store.load();
    init_logging(&LogOptions {
        log_file: paths.log_file(),
        debug_enabled: stored.debug_logging,
        echo_to_terminal: cli.verbose,
        max_log_size: stored.max_log_size_bytes,
    });
    log::info!(
        "fishlaunch {} starting ({})",
        env!("CARGO_PKG_VERSION"),
        fishlaunch_platform::Platform::current()
    );

    let service = match LauncherService::new(store, &paths) {
        Ok(service) => service,
        Err(error) => {
            log::error!("Startup failed: {error}");
            eprintln!("fishlaunch: {error}");
            return ExitCode::FAILURE;
        }
    };

    if cli.execute(&service).await {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
