//! Global constants used throughout the launcher.
//!
//! This module contains timeout durations, file names, and environment
//! variable names that are used across multiple modules. Defining them
//! centrally keeps the wire and on-disk contracts in one place.

use std::time::Duration;

/// Timeout applied to every HTTP request (5 minutes).
///
/// Expiry is reported as a network failure for the current stage; the
/// request is not retried.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// File name of the persisted version record inside the install root.
pub const VERSION_FILE_NAME: &str = "version.json";

/// File name of the launcher configuration inside the install root.
pub const CONFIG_FILE_NAME: &str = "patchlaunch.toml";

/// Suffix appended to the launcher executable while a replacement is in flight.
pub const STALE_EXECUTABLE_SUFFIX: &str = ".old";

/// Suffix used for a freshly downloaded launcher executable before it is swapped in.
pub const STAGED_EXECUTABLE_SUFFIX: &str = ".new";

/// Extension of patch artifacts on the origin (`<dest>/<source>.patch`).
pub const PATCH_EXTENSION: &str = "patch";

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV: &str = "PATCHLAUNCH_CONFIG_PATH";

/// Environment variable that hides progress bars when set.
pub const NO_PROGRESS_ENV: &str = "PATCHLAUNCH_NO_PROGRESS";

/// Environment variable overriding the install root.
pub const INSTALL_DIR_ENV: &str = "PATCHLAUNCH_INSTALL_DIR";

/// Resolution of the console progress bar (fractions are scaled to this).
pub const PROGRESS_RESOLUTION: u64 = 1000;

/// Argument name passed to the launched package, followed by the launcher path.
pub const LAUNCHER_ARG: &str = "--launcher";
