//! Launcher configuration.
//!
//! The launcher reads a small TOML file that names the distribution origin and
//! describes the installed package layout. It is looked up in this order:
//!
//! 1. The `--config` command-line flag
//! 2. The `PATCHLAUNCH_CONFIG_PATH` environment variable
//! 3. `patchlaunch.toml` in the install root
//!
//! # File Format
//!
//! ```toml
//! # Distribution origin; also the identity recorded with every install
//! origin = "https://cdn.example.com/nix"
//!
//! # Bucket listing endpoint for patch discovery (defaults to origin)
//! index_url = "https://cdn.example.com/nix"
//!
//! # Release channel to follow: "stable" or "dev"
//! channel = "stable"
//!
//! # Where the channel's current build number is published
//! channel_url = "{origin}/channels/{channel}"
//!
//! # Directory inside the install root that holds the package, and the
//! # executable inside it that gets launched
//! package_dir = "app"
//! executable = "App"
//!
//! # Pass `--launcher <path to this launcher>` to the package
//! forward_launcher_path = true
//!
//! # Optional: keep the launcher itself up to date
//! [launcher]
//! version_url = "https://cdn.example.com/launcher/version"
//! download_url = "https://cdn.example.com/launcher/{version}/patchlaunch"
//! ```

use crate::constants::{CONFIG_FILE_NAME, CONFIG_PATH_ENV};
use crate::core::LauncherError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Release channels published by the origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseChannel {
    /// Known-good builds; also the fallback target when patching fails.
    #[default]
    Stable,
    /// Development builds.
    Dev,
}

impl ReleaseChannel {
    /// Channel name as used in URLs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Dev => "dev",
        }
    }
}

impl fmt::Display for ReleaseChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for updating the launcher executable itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherUpdateConfig {
    /// URL returning the latest launcher version as a semver string.
    pub version_url: String,
    /// Download URL of the launcher executable; `{version}` is substituted.
    pub download_url: String,
}

/// Launcher configuration loaded from `patchlaunch.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Base URL of the distribution origin. Also serves as the origin identity
    /// stored in the version record; installs from a different origin are
    /// always fully reinstalled.
    pub origin: String,

    /// Bucket-listing endpoint used for patch discovery. Defaults to `origin`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_url: Option<String>,

    /// Release channel to follow.
    #[serde(default)]
    pub channel: ReleaseChannel,

    /// Template for the channel build-number URL. Supports `{origin}` and
    /// `{channel}` placeholders.
    #[serde(default = "default_channel_url")]
    pub channel_url: String,

    /// Directory under the install root holding the installed package. Patch
    /// archives are relative to this directory.
    #[serde(default = "default_package_dir")]
    pub package_dir: String,

    /// Executable inside `package_dir` that is launched after updating.
    #[serde(default = "default_executable")]
    pub executable: String,

    /// Whether to pass `--launcher <path>` to the launched package.
    #[serde(default = "default_forward_launcher_path")]
    pub forward_launcher_path: bool,

    /// Optional launcher self-update settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launcher: Option<LauncherUpdateConfig>,
}

fn default_channel_url() -> String {
    "{origin}/channels/{channel}".to_string()
}

fn default_package_dir() -> String {
    "app".to_string()
}

fn default_executable() -> String {
    "app".to_string()
}

const fn default_forward_launcher_path() -> bool {
    true
}

impl LauncherConfig {
    /// Create a configuration for `origin` with every other field defaulted.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            index_url: None,
            channel: ReleaseChannel::default(),
            channel_url: default_channel_url(),
            package_dir: default_package_dir(),
            executable: default_executable(),
            forward_launcher_path: default_forward_launcher_path(),
            launcher: None,
        }
    }

    /// Resolve where the configuration file lives.
    #[must_use]
    pub fn locate(explicit: Option<&Path>, install_root: &Path) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV)
            && !path.is_empty()
        {
            return PathBuf::from(path);
        }
        install_root.join(CONFIG_FILE_NAME)
    }

    /// Load and validate the configuration at `path`.
    ///
    /// # Errors
    ///
    /// [`LauncherError::ConfigNotFound`] if the file does not exist, a parse
    /// error if it is not valid TOML, or [`LauncherError::ConfigError`] if a
    /// field fails validation.
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LauncherError::ConfigNotFound {
                path: path.display().to_string(),
            }
            .into());
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .map_err(LauncherError::from)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check field values that serde cannot.
    pub fn validate(&self) -> Result<(), LauncherError> {
        let is_http = |url: &str| url.starts_with("http://") || url.starts_with("https://");

        if !is_http(&self.origin) {
            return Err(LauncherError::ConfigError {
                message: format!("origin must be an http(s) URL, got '{}'", self.origin),
            });
        }
        if let Some(index) = &self.index_url
            && !is_http(index)
        {
            return Err(LauncherError::ConfigError {
                message: format!("index_url must be an http(s) URL, got '{index}'"),
            });
        }
        let bad_segment = |s: &str| s.is_empty() || s == "." || s == ".." || s.contains(['/', '\\']);
        if bad_segment(&self.package_dir) {
            return Err(LauncherError::ConfigError {
                message: format!("package_dir must be a single directory name, got '{}'", self.package_dir),
            });
        }
        if self.executable.is_empty() {
            return Err(LauncherError::ConfigError {
                message: "executable must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Origin base URL without a trailing slash.
    #[must_use]
    pub fn origin(&self) -> &str {
        self.origin.trim_end_matches('/')
    }

    /// Identity recorded with installs from this origin.
    #[must_use]
    pub fn origin_id(&self) -> &str {
        self.origin()
    }

    /// Listing query for patches producing `destination`.
    #[must_use]
    pub fn index_query_url(&self, destination: u32) -> String {
        let base = self.index_url.as_deref().unwrap_or(&self.origin).trim_end_matches('/');
        let separator = if base.contains('?') { '&' } else { '?' };
        format!("{base}{separator}prefix={destination}/")
    }

    /// Download URL of the full package for `version`.
    #[must_use]
    pub fn package_url(&self, version: u32, artifact: &str) -> String {
        format!("{}/{version}/{artifact}", self.origin())
    }

    /// Download URL of the patch from `source` to `destination`.
    #[must_use]
    pub fn patch_url(&self, source: u32, destination: u32) -> String {
        format!("{}/{destination}/{source}.{}", self.origin(), crate::constants::PATCH_EXTENSION)
    }

    /// URL publishing the current build number of `channel`.
    #[must_use]
    pub fn channel_url(&self, channel: ReleaseChannel) -> String {
        self.channel_url.replace("{origin}", self.origin()).replace("{channel}", channel.as_str())
    }
}
