//! Platform glue for fishlaunch: per-OS application directories, host
//! platform detection, and process-spawning helpers.

mod commands;
mod os;
mod paths;

pub use commands::DetachProcess;
pub use os::Platform;
pub use paths::{AppPaths, AppPathsError};
