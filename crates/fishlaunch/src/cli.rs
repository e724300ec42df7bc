use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use fishlaunch::{DirectorySelection, LauncherService, OperationResult, PromptPicker, UpdateTarget};
use fishlaunch_core::{InstallPhase, UpdateProgress, is_valid_install_directory};
use log::{info, warn};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const PROGRESS_BUFFER: usize = 64;

#[derive(Debug, Parser)]
#[command(name = "fishlaunch", version, about = "Keep a game install up to date and start it")]
pub struct Cli {
    /// Echo log output to the terminal.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the game directory, installed version, and update server.
    Status,
    /// Use PATH as the game directory.
    SetDir { path: PathBuf },
    /// Choose the game directory interactively.
    PickDir,
    /// Print the installed version of DIR (default: the game directory).
    Version { dir: Option<PathBuf> },
    /// Ask the update server whether a newer build is published.
    Check,
    /// Download and install the published update.
    Update {
        /// Install this archive name or URL instead of the checked release.
        #[arg(long)]
        file: Option<String>,
    },
    /// Start the game.
    Launch,
    /// Update if needed (and enabled), then start the game.
    Play,
    /// Show news from the update server.
    News,
    /// Show launcher settings.
    Settings,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    game_directory: Option<PathBuf>,
    installed_version: String,
    valid_install: bool,
    server_url: String,
    auto_updates: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionReport {
    version: String,
}

impl Cli {
    /// Run the selected command and report whether it succeeded.
    pub async fn execute(self, service: &LauncherService) -> bool {
        let out = Output { json: self.json };
        match self.command {
            Command::Status => {
                status(&out, service);
                true
            }
            Command::SetDir { path } => set_dir(&out, service, &path),
            Command::PickDir => pick_dir(&out, service),
            Command::Version { dir } => {
                let dir = dir.or_else(|| service.get_game_directory()).unwrap_or_default();
                let version = service.get_game_version(&dir);
                out.emit(
                    &VersionReport {
                        version: version.clone(),
                    },
                    || version,
                );
                true
            }
            Command::Check => check(&out, service).await,
            Command::Update { file } => update(&out, service, file).await,
            Command::Launch => launch(&out, service),
            Command::Play => play(&out, service).await,
            Command::News => news(&out, service).await,
            Command::Settings => {
                let info = service.get_app_settings();
                out.emit(&info, || {
                    format!(
                        "{} {}\nServer: {}\nAuto updates: {}",
                        info.app_name,
                        info.app_version,
                        info.server_url,
                        on_off(info.enable_auto_updates)
                    )
                });
                true
            }
        }
    }
}

struct Output {
    json: bool,
}

impl Output {
    fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce() -> String) {
        if self.json {
            match serde_json::to_string_pretty(value) {
                Ok(json) => println!("{json}"),
                Err(error) => eprintln!("failed to encode result: {error}"),
            }
        } else {
            println!("{}", human());
        }
    }

    fn emit_result(&self, result: &OperationResult, success_text: impl FnOnce() -> String) -> bool {
        self.emit(result, || {
            if result.success {
                success_text()
            } else {
                format!(
                    "Error: {}",
                    result.error.as_deref().unwrap_or("operation failed")
                )
            }
        });
        result.success
    }

    fn progress(&self, update: &UpdateProgress) {
        if self.json {
            if let Ok(line) = serde_json::to_string(update) {
                println!("{line}");
            }
            return;
        }
        match update {
            UpdateProgress::Downloading { percent } => println!("Downloading... {percent}%"),
            UpdateProgress::Phase { phase } => match phase {
                InstallPhase::Downloading => println!("Downloading update..."),
                InstallPhase::Extracting => println!("Extracting update..."),
                InstallPhase::Finalizing => println!("Finishing installation..."),
                InstallPhase::Idle | InstallPhase::Done | InstallPhase::Failed => {}
            },
        }
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

fn status(out: &Output, service: &LauncherService) {
    let settings = service.settings();
    let game_directory = service.get_game_directory();
    let report = StatusReport {
        installed_version: service
            .get_game_version(game_directory.as_deref().unwrap_or(Path::new(""))),
        valid_install: game_directory
            .as_deref()
            .is_some_and(is_valid_install_directory),
        game_directory,
        server_url: service.get_app_settings().server_url,
        auto_updates: settings.enable_auto_updates,
    };
    out.emit(&report, || {
        let directory = report
            .game_directory
            .as_ref()
            .map_or_else(|| "(not set)".to_string(), |dir| dir.display().to_string());
        format!(
            "Game directory: {directory}\nInstalled version: {}{}\nUpdate server: {}\nAuto updates: {}",
            report.installed_version,
            if report.valid_install { "" } else { " (no version.json)" },
            report.server_url,
            on_off(report.auto_updates)
        )
    });
}

fn set_dir(out: &Output, service: &LauncherService, path: &Path) -> bool {
    let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let result = match service.save_game_directory(&path) {
        Ok(()) => OperationResult {
            success: true,
            error: None,
            error_kind: None,
            version: None,
            executable: None,
        },
        Err(app_error) => OperationResult::failed(&app_error),
    };
    out.emit_result(&result, || format!("Game directory set to {}", path.display()))
}

fn pick_dir(out: &Output, service: &LauncherService) -> bool {
    let selection = service.select_directory(&mut PromptPicker::stdio());
    match &selection {
        DirectorySelection::Selected(path) => set_dir(out, service, path),
        DirectorySelection::Canceled => {
            out.emit(&selection, || "No directory selected".to_string());
            true
        }
    }
}

async fn check(out: &Output, service: &LauncherService) -> bool {
    let check = service.check_for_updates().await;
    out.emit(&check, || match (&check.error, &check.update_info) {
        (Some(error), _) => format!("Could not check for updates: {error}"),
        (None, Some(update)) => {
            let mut text = format!(
                "Update available: {} -> {}",
                check.current_version, update.version
            );
            if let Some(notes) = &update.release_notes {
                text.push_str(&format!("\n{notes}"));
            }
            text
        }
        (None, None) => format!("Up to date ({})", check.current_version),
    });
    check.error.is_none()
}

fn require_game_directory(out: &Output, service: &LauncherService) -> Option<PathBuf> {
    let dir = service.get_game_directory();
    if dir.is_none() {
        let result = OperationResult {
            success: false,
            error: Some("Game directory not set".to_string()),
            error_kind: Some(fishlaunch_core::ErrorKind::Configuration),
            version: None,
            executable: None,
        };
        out.emit_result(&result, String::new);
    }
    dir
}

async fn update(out: &Output, service: &LauncherService, file: Option<String>) -> bool {
    let Some(dir) = require_game_directory(out, service) else {
        return false;
    };

    let target = match file {
        Some(file) => UpdateTarget::from(file),
        None => {
            let check = service.check_for_updates().await;
            match (check.error, check.update_info) {
                (Some(error), _) => {
                    let result = OperationResult {
                        success: false,
                        error: Some(error),
                        error_kind: check.error_kind,
                        version: None,
                        executable: None,
                    };
                    return out.emit_result(&result, String::new);
                }
                (None, Some(descriptor)) => UpdateTarget::from(descriptor),
                (None, None) => {
                    out.emit(&check.current_version, || {
                        format!("Already up to date ({})", check.current_version)
                    });
                    return true;
                }
            }
        }
    };

    let result = download(out, service, target, &dir).await;
    out.emit_result(&result, || {
        format!(
            "Installed version {}",
            result.version.as_deref().unwrap_or("unknown")
        )
    })
}

/// Run one download while streaming progress; Ctrl-C cancels it.
async fn download(
    out: &Output,
    service: &LauncherService,
    target: UpdateTarget,
    dir: &Path,
) -> OperationResult {
    let (tx, mut rx) = mpsc::channel(PROGRESS_BUFFER);
    let cancel = CancellationToken::new();

    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, cancelling download");
                cancel.cancel();
            }
        })
    };

    let (result, ()) = tokio::join!(service.download_update(target, dir, tx, cancel), async {
        while let Some(update) = rx.recv().await {
            out.progress(&update);
        }
    });
    interrupt.abort();
    result
}

fn launch(out: &Output, service: &LauncherService) -> bool {
    let Some(dir) = require_game_directory(out, service) else {
        return false;
    };
    let result = service.launch_game(&dir);
    out.emit_result(&result, || {
        format!(
            "Started {}",
            result
                .executable
                .as_ref()
                .map_or_else(String::new, |exe| exe.display().to_string())
        )
    })
}

async fn play(out: &Output, service: &LauncherService) -> bool {
    let Some(dir) = require_game_directory(out, service) else {
        return false;
    };

    if service.settings().enable_auto_updates {
        let check = service.check_for_updates().await;
        match (check.error, check.update_info) {
            (Some(error), _) => warn!("Skipping update, check failed: {error}"),
            (None, Some(descriptor)) => {
                let result = download(out, service, UpdateTarget::from(descriptor), &dir).await;
                if !out.emit_result(&result, || "Update installed".to_string()) {
                    return false;
                }
            }
            (None, None) => {}
        }
    }

    launch(out, service)
}

async fn news(out: &Output, service: &LauncherService) -> bool {
    let items = service.get_news_items().await;
    out.emit(&items, || {
        if items.is_empty() {
            return "No news".to_string();
        }
        items
            .iter()
            .map(|item| format!("[{}] {}\n{}", item.date, item.title, item.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    });
    true
}
