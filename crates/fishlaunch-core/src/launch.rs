use std::path::{Path, PathBuf};
use std::process::Command;

use fishlaunch_platform::{DetachProcess, Platform};
use log::{debug, info};
use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Game directory not set")]
    DirectoryNotSet,
    #[error("Game directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),
    #[error("No executable found in game directory")]
    NotFound(PathBuf),
    #[error("failed to read game directory {}: {source}", .path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to start {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LaunchError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DirectoryNotSet | Self::DirectoryNotFound(_) => ErrorKind::Configuration,
            Self::NotFound(_) | Self::Spawn { .. } => ErrorKind::Launch,
            Self::ReadDir { .. } => ErrorKind::Filesystem,
        }
    }
}

/// Start the game found in `install_dir` for the running OS.
///
/// # Errors
/// See [`launch_on`].
pub fn launch(install_dir: &Path) -> Result<PathBuf, LaunchError> {
    launch_on(install_dir, Platform::current())
}

/// Start the game in `install_dir` using `platform`'s executable rules.
///
/// The game runs detached with the install directory as its working
/// directory; this returns as soon as the process has been started.
///
/// # Errors
/// Fails when the directory is unset or missing, holds no executable, or the
/// OS refuses to start it.
pub fn launch_on(install_dir: &Path, platform: Platform) -> Result<PathBuf, LaunchError> {
    if install_dir.as_os_str().is_empty() {
        return Err(LaunchError::DirectoryNotSet);
    }
    if !install_dir.is_dir() {
        return Err(LaunchError::DirectoryNotFound(install_dir.to_path_buf()));
    }

    let executable = find_executable(install_dir, platform)?
        .ok_or_else(|| LaunchError::NotFound(install_dir.to_path_buf()))?;

    let mut command = match platform {
        Platform::MacOs => {
            let mut command = Command::new("open");
            command.arg("-n").arg(&executable);
            command
        }
        Platform::Windows | Platform::Linux => Command::new(&executable),
    };
    let child = command
        .current_dir(install_dir)
        .detach()
        .spawn()
        .map_err(|source| LaunchError::Spawn {
            path: executable.clone(),
            source,
        })?;

    info!(
        "Launched {} (pid {})",
        executable.display(),
        child.id()
    );
    Ok(executable)
}

/// The entry `platform` would launch from `dir`, if any.
///
/// Candidates are ordered by file name so the choice does not depend on the
/// order the filesystem lists entries in.
///
/// # Errors
/// Returns an error if the directory cannot be listed.
pub fn find_executable(dir: &Path, platform: Platform) -> Result<Option<PathBuf>, LaunchError> {
    let entries = std::fs::read_dir(dir).map_err(|source| LaunchError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| is_candidate(path, platform))
        .collect();
    candidates.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    if candidates.len() > 1 {
        debug!(
            "{} launch candidates in {}, using the first",
            candidates.len(),
            dir.display()
        );
    }
    Ok(candidates.into_iter().next())
}

fn is_candidate(path: &Path, platform: Platform) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    match platform {
        Platform::Windows => path.is_file() && name.len() > ".exe".len() && name.ends_with(".exe"),
        Platform::MacOs => name.len() > ".app".len() && name.ends_with(".app"),
        Platform::Linux => path.is_file() && !name.contains('.'),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir_with(files: &[&str], dirs: &[&str]) -> tempfile::TempDir {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        for file in files {
            std::fs::write(temp.path().join(file), b"bin").expect("file should be written");
        }
        for dir in dirs {
            std::fs::create_dir_all(temp.path().join(dir)).expect("dir should be created");
        }
        temp
    }

    fn found_name(dir: &Path, platform: Platform) -> Option<String> {
        find_executable(dir, platform)
            .expect("directory should be listable")
            .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
    }

    #[test]
    fn windows_picks_first_exe_by_name() {
        let temp = dir_with(&["version.json", "Zeta.exe", "Alpha.exe", "readme.txt"], &["data.exe"]);

        assert_eq!(found_name(temp.path(), Platform::Windows).as_deref(), Some("Alpha.exe"));
    }

    #[test]
    fn windows_suffix_match_is_exact() {
        let temp = dir_with(&["LAUNCHER.EXE", "Setup.Exe", "Game.exe"], &[]);
        let shouty = dir_with(&["LAUNCHER.EXE", ".exe"], &[]);

        assert_eq!(found_name(temp.path(), Platform::Windows).as_deref(), Some("Game.exe"));
        assert!(found_name(shouty.path(), Platform::Windows).is_none());
    }

    #[test]
    fn macos_picks_app_bundles() {
        let temp = dir_with(&["Game", "version.json"], &["Fish.app", "Bait.app"]);

        assert_eq!(found_name(temp.path(), Platform::MacOs).as_deref(), Some("Bait.app"));
    }

    #[test]
    fn linux_picks_dotless_regular_files() {
        let temp = dir_with(&["version.json", "libgame.so", "run", "Game"], &["assets"]);

        assert_eq!(found_name(temp.path(), Platform::Linux).as_deref(), Some("Game"));
    }

    #[test]
    fn empty_directory_has_no_candidate() {
        let temp = dir_with(&["version.json"], &[]);

        for platform in [Platform::Windows, Platform::MacOs, Platform::Linux] {
            assert!(found_name(temp.path(), platform).is_none());
        }
    }

    #[test]
    fn no_candidate_is_reported_without_spawning() {
        let temp = dir_with(&["version.json", "notes.txt"], &[]);

        let error = launch_on(temp.path(), Platform::Linux).expect_err("nothing to launch");

        assert_eq!(error.to_string(), "No executable found in game directory");
        assert_eq!(error.kind(), ErrorKind::Launch);
    }

    #[test]
    fn unset_and_missing_directories_are_configuration_errors() {
        let temp = tempfile::tempdir().expect("tempdir should be created");

        let unset = launch(Path::new("")).expect_err("unset directory should fail");
        let missing = launch(&temp.path().join("gone")).expect_err("missing directory should fail");

        assert!(matches!(unset, LaunchError::DirectoryNotSet));
        assert_eq!(missing.kind(), ErrorKind::Configuration);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn launches_detached_child() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let game = temp.path().join("game");
        std::os::unix::fs::symlink("/bin/sh", &game).expect("symlink should be created");

        let launched = launch_on(temp.path(), Platform::Linux).expect("child should start");

        assert_eq!(launched, game);
    }
}
