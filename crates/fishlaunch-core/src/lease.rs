use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use log::debug;
use thiserror::Error;

const LOCK_DIR_NAME: &str = "fishlaunch-locks";

#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("an update is already in progress for {}", .0.display())]
    Busy(PathBuf),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl LeaseError {
    fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

/// Exclusive claim on an install directory for the length of one update.
///
/// Backed by an advisory lock on a file in the OS temp directory whose name
/// is derived from the canonical install path, so a second updater is turned
/// away whether it runs in this process or another one, and the install
/// directory itself gains no bookkeeping files. Dropping the lease releases
/// it.
#[derive(Debug)]
pub struct InstallLease {
    file: File,
    install_dir: PathBuf,
}

impl InstallLease {
    /// Try to take the lease without waiting.
    ///
    /// # Errors
    /// Returns [`LeaseError::Busy`] if another update holds the lease, or an
    /// I/O error if the directory cannot be resolved or the lock file cannot
    /// be opened.
    pub fn acquire(install_dir: &Path) -> Result<Self, LeaseError> {
        Self::acquire_in(&std::env::temp_dir().join(LOCK_DIR_NAME), install_dir)
    }

    /// Like [`InstallLease::acquire`], keeping lock files in `lock_dir`.
    ///
    /// # Errors
    /// See [`InstallLease::acquire`].
    pub fn acquire_in(lock_dir: &Path, install_dir: &Path) -> Result<Self, LeaseError> {
        let canonical = std::fs::canonicalize(install_dir)
            .map_err(|error| LeaseError::io("failed to resolve install directory", error))?;
        std::fs::create_dir_all(lock_dir)
            .map_err(|error| LeaseError::io("failed to create lock directory", error))?;

        let mut lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(lock_dir.join(lock_file_name(&canonical)))
            .map_err(|error| LeaseError::io("failed to open install lock file", error))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => {}
            Err(error) if is_contended(&error) => {
                return Err(LeaseError::Busy(install_dir.to_path_buf()));
            }
            Err(error) => {
                return Err(LeaseError::io("failed to acquire install lock", error));
            }
        }

        lock_file
            .set_len(0)
            .and_then(|()| lock_file.seek(SeekFrom::Start(0)).map(|_| ()))
            .and_then(|()| {
                writeln!(
                    lock_file,
                    "{} {}",
                    std::process::id(),
                    canonical.display()
                )
            })
            .map_err(|error| LeaseError::io("failed to write install lock metadata", error))?;

        debug!("Acquired install lease for {}", install_dir.display());
        Ok(Self {
            file: lock_file,
            install_dir: install_dir.to_path_buf(),
        })
    }
}

impl Drop for InstallLease {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!("Released install lease for {}", self.install_dir.display());
    }
}

/// Stable per-directory lock name (64-bit FNV-1a of the canonical path).
fn lock_file_name(canonical: &Path) -> String {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;

    let hash = canonical
        .as_os_str()
        .as_encoded_bytes()
        .iter()
        .fold(OFFSET_BASIS, |hash, &byte| {
            (hash ^ u64::from(byte)).wrapping_mul(PRIME)
        });
    format!("{hash:016x}.lock")
}

fn is_contended(error: &std::io::Error) -> bool {
    error.kind() == std::io::ErrorKind::WouldBlock
        || (error.raw_os_error().is_some()
            && error.raw_os_error() == fs2::lock_contended_error().raw_os_error())
}
