//! Launcher log setup: `debug.log` in the data directory, optionally mirrored
//! to stderr.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};

#[derive(Debug, Clone)]
pub struct LogOptions {
    pub log_file: PathBuf,
    /// The `debug_logging` setting.
    pub debug_enabled: bool,
    /// `--verbose`; implies debug output.
    pub echo_to_terminal: bool,
    /// Size above which the previous session's log is rotated out at startup.
    pub max_log_size: u64,
}

impl LogOptions {
    fn level(&self) -> LevelFilter {
        if self.debug_enabled || self.echo_to_terminal {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }

    fn mirror_to_terminal(&self) -> bool {
        cfg!(debug_assertions) || self.echo_to_terminal
    }
}

/// `debug.log` -> `debug.old.log`.
fn rotated_path(log_file: &Path) -> PathBuf {
    let stem = log_file
        .file_stem()
        .map_or_else(|| "debug".into(), |stem| stem.to_string_lossy());
    let name = match log_file.extension() {
        Some(ext) => format!("{stem}.old.{}", ext.to_string_lossy()),
        None => format!("{stem}.old"),
    };
    log_file.with_file_name(name)
}

/// Move an oversized log aside so each run starts small. Only one older
/// generation is kept.
fn rotate_if_oversized(log_file: &Path, max_size: u64) -> io::Result<bool> {
    match std::fs::metadata(log_file) {
        Ok(metadata) if metadata.len() > max_size => {
            std::fs::rename(log_file, rotated_path(log_file))?;
            Ok(true)
        }
        Ok(_) => Ok(false),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error),
    }
}

/// Append-only handle on the launcher log. If the file (or the data
/// directory) is removed while the launcher runs, the next line recreates it.
struct LauncherLogFile {
    path: PathBuf,
    file: File,
}

impl LauncherLogFile {
    fn open(path: PathBuf) -> io::Result<Self> {
        let file = Self::append_to(&path)?;
        Ok(Self { path, file })
    }

    fn append_to(path: &Path) -> io::Result<File> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        OpenOptions::new().create(true).append(true).open(path)
    }
}

impl Write for LauncherLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.path.exists() {
            self.file = Self::append_to(&self.path)?;
        }
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Install the global logger. Later calls are ignored.
pub fn init_logging(options: &LogOptions) {
    let rotated = rotate_if_oversized(&options.log_file, options.max_log_size);

    let level = options.level();
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("fishlaunch")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if options.mirror_to_terminal() {
        loggers.push(TermLogger::new(
            level,
            config.clone(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }
    match LauncherLogFile::open(options.log_file.clone()) {
        Ok(file) => loggers.push(WriteLogger::new(level, config, file)),
        Err(error) => eprintln!(
            "fishlaunch: cannot open log file {}: {error}",
            options.log_file.display()
        ),
    }
    if loggers.is_empty() || CombinedLogger::init(loggers).is_err() {
        return;
    }

    match rotated {
        Ok(true) => log::info!(
            "Previous log moved to {}",
            rotated_path(&options.log_file).display()
        ),
        Ok(false) => {}
        Err(error) => log::warn!("Could not rotate {}: {error}", options.log_file.display()),
    }
    log::debug!("Logging to {} at {level}", options.log_file.display());
}
