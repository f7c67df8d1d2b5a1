//! Error handling for the launcher
//!
//! This module provides the error types and user-friendly error reporting for
//! patchlaunch. It follows two principles:
//! 1. **Strongly-typed errors** so the update session can decide which failures
//!    trigger the fallback policy and which are fatal
//! 2. **User-friendly messages** with actionable suggestions for the few errors
//!    that do reach the terminal
//!
//! # Architecture
//!
//! - [`LauncherError`] - Enumerated error types for every failure kind
//! - [`ErrorContext`] - Wrapper that adds user-friendly messages and suggestions
//!
//! Call sites return `anyhow::Result` and attach context with `.context()`;
//! a [`LauncherError`] anywhere in the chain can be recovered with
//! [`find_launcher_error`].
//!
//! # Failure policy
//!
//! | Kind | Policy |
//! |------|--------|
//! | [`LauncherError::NetworkFailure`] | abort stage, fall back |
//! | [`LauncherError::ChainUnreachable`] | fall back |
//! | [`LauncherError::SecurityViolation`] | stop archive, record not advanced, fall back |
//! | [`LauncherError::PatchBaseMissing`] | abort stage, fall back |
//! | [`LauncherError::SelfReplaceFailure`] | fatal, no relaunch |
//!
//! # Examples
//!
//! ```rust,no_run
//! use patchlaunch::core::{LauncherError, user_friendly_error};
//!
//! let err = anyhow::Error::from(LauncherError::ConfigNotFound {
//!     path: "patchlaunch.toml".to_string(),
//! });
//! user_friendly_error(err).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for launcher operations.
///
/// Each variant corresponds to a failure kind with its own handling policy in
/// the update session. Fields are plain strings so the error can be cloned and
/// displayed without borrowing from the failing operation.
#[derive(Error, Debug)]
pub enum LauncherError {
    /// A request failed: connection error, timeout, or non-success status.
    #[error("Network error: {operation}")]
    NetworkFailure {
        /// What was being fetched (e.g. "download patch 12 -> 13")
        operation: String,
        /// Transport or HTTP status detail
        reason: String,
    },

    /// No patch chain exists from the installed version to the requested one.
    #[error("No patch path from version {current} to version {desired}")]
    ChainUnreachable {
        /// Installed version
        current: u32,
        /// Requested version
        desired: u32,
    },

    /// An archive entry resolved to a path outside the destination root.
    #[error("Archive entry '{entry}' escapes destination directory {root}")]
    SecurityViolation {
        /// Raw entry name from the archive
        entry: String,
        /// Destination root the entry had to stay within
        root: String,
    },

    /// A diff-encoded patch entry has no local file to apply against.
    #[error("Patch base file is missing: {path}")]
    PatchBaseMissing {
        /// Expected on-disk location of the base file
        path: String,
    },

    /// Renaming or moving the launcher executable failed.
    #[error("Failed to replace launcher executable during {operation}: {path}")]
    SelfReplaceFailure {
        /// Step of the replace protocol that failed
        operation: String,
        /// Path involved in the failed step
        path: String,
        /// Underlying OS error
        reason: String,
    },

    /// A diff codec rejected its input.
    #[error("{codec} patch failed for {path}: {reason}")]
    CodecFailure {
        /// Codec name (`bsdiff`, `xdelta`)
        codec: String,
        /// Target file being reconstructed
        path: String,
        /// Codec error detail
        reason: String,
    },

    /// A patch entry names a codec this build cannot apply.
    #[error("Unsupported patch codec: {codec}")]
    UnsupportedCodec {
        /// Codec name found in the archive
        codec: String,
    },

    /// An archive could not be read or has an unknown format.
    #[error("Invalid archive {path}: {reason}")]
    ArchiveError {
        /// Archive file on disk
        path: String,
        /// Decoder error detail
        reason: String,
    },

    /// A release channel answered with something that is not a build number.
    #[error("Release channel '{channel}' returned an invalid build number: {body}")]
    InvalidChannelResponse {
        /// Channel name
        channel: String,
        /// Response body (trimmed)
        body: String,
    },

    /// Configuration is present but invalid.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// What is wrong with the configuration
        message: String,
    },

    /// No configuration file was found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// Location that was searched
        path: String,
    },

    /// Operation not supported on this platform.
    #[error("Operation not supported on this platform: {operation}")]
    PlatformNotSupported {
        /// Operation that was attempted
        operation: String,
    },

    /// IO error from the standard library.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error from the configuration file.
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Generic error for cases not covered by specific variants.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

impl LauncherError {
    /// Whether the update session may recover from this error by falling back
    /// to a full reinstall of the stable build (or abandoning the update).
    ///
    /// Configuration problems and self-replace failures are not recoverable:
    /// the first cannot be fixed by downloading anything and the second leaves
    /// the launcher in a state where relaunching is unsafe.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::SelfReplaceFailure { .. }
                | Self::ConfigError { .. }
                | Self::ConfigNotFound { .. }
                | Self::TomlError(_)
                | Self::PlatformNotSupported { .. }
        )
    }
}

impl Clone for LauncherError {
    fn clone(&self) -> Self {
        match self {
            Self::NetworkFailure {
                operation,
                reason,
            } => Self::NetworkFailure {
                operation: operation.clone(),
                reason: reason.clone(),
            },
            Self::ChainUnreachable {
                current,
                desired,
            } => Self::ChainUnreachable {
                current: *current,
                desired: *desired,
            },
            Self::SecurityViolation {
                entry,
                root,
            } => Self::SecurityViolation {
                entry: entry.clone(),
                root: root.clone(),
            },
            Self::PatchBaseMissing {
                path,
            } => Self::PatchBaseMissing {
                path: path.clone(),
            },
            Self::SelfReplaceFailure {
                operation,
                path,
                reason,
            } => Self::SelfReplaceFailure {
                operation: operation.clone(),
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::CodecFailure {
                codec,
                path,
                reason,
            } => Self::CodecFailure {
                codec: codec.clone(),
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::UnsupportedCodec {
                codec,
            } => Self::UnsupportedCodec {
                codec: codec.clone(),
            },
            Self::ArchiveError {
                path,
                reason,
            } => Self::ArchiveError {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::InvalidChannelResponse {
                channel,
                body,
            } => Self::InvalidChannelResponse {
                channel: channel.clone(),
                body: body.clone(),
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            Self::ConfigNotFound {
                path,
            } => Self::ConfigNotFound {
                path: path.clone(),
            },
            Self::PlatformNotSupported {
                operation,
            } => Self::PlatformNotSupported {
                operation: operation.clone(),
            },
            // For errors that don't implement Clone, convert to Other
            Self::IoError(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::TomlError(e) => Self::Other {
                message: format!("TOML parsing error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// Find the first [`LauncherError`] in an `anyhow` error chain.
///
/// Stage functions wrap typed errors with `.context(...)`, so the typed error
/// is usually not the outermost one.
#[must_use]
pub fn find_launcher_error(error: &anyhow::Error) -> Option<&LauncherError> {
    error.chain().find_map(|cause| cause.downcast_ref::<LauncherError>())
}

/// Error context wrapper that provides user-friendly error information.
///
/// When displayed, errors show:
/// 1. **Error**: The main error message in red
/// 2. **Details**: Additional context in yellow (optional)
/// 3. **Suggestion**: Actionable steps in green (optional)
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: LauncherError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context from a [`LauncherError`].
    #[must_use]
    pub const fn new(error: LauncherError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into a user-friendly [`ErrorContext`] with suggestions.
///
/// Recognizes [`LauncherError`] anywhere in the chain and common IO error
/// kinds; anything else is reported with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(launcher_error) = find_launcher_error(&error) {
        return create_error_context(launcher_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>()
        && io_error.kind() == std::io::ErrorKind::PermissionDenied
    {
        return ErrorContext::new(LauncherError::Other {
            message: error.to_string(),
        })
        .with_suggestion("Check that the install directory is writable by the current user")
        .with_details("The launcher needs write access to its own directory to install updates");
    }

    // Generic error - include the full error chain for better diagnostics
    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(LauncherError::Other {
        message,
    })
}

fn create_error_context(error: LauncherError) -> ErrorContext {
    match &error {
        LauncherError::ConfigNotFound { .. } => ErrorContext::new(error)
            .with_suggestion(format!(
                "Create {} next to the launcher or point {} at one",
                crate::constants::CONFIG_FILE_NAME,
                crate::constants::CONFIG_PATH_ENV
            ))
            .with_details("The configuration names the origin server updates are downloaded from"),
        LauncherError::ConfigError { .. } | LauncherError::TomlError(_) => ErrorContext::new(error)
            .with_suggestion("Check the TOML syntax and that `origin` is an http(s) URL"),
        LauncherError::SelfReplaceFailure { .. } => ErrorContext::new(error)
            .with_suggestion(format!(
                "If the launcher no longer starts, rename the '{}' file next to it back to the original name",
                crate::constants::STALE_EXECUTABLE_SUFFIX
            ))
            .with_details("The launcher could not swap its own executable for the downloaded one"),
        LauncherError::NetworkFailure { reason, .. } => {
            let details = format!("Request failed: {reason}");
            ErrorContext::new(error)
                .with_suggestion("Check your internet connection and try again")
                .with_details(details)
        }
        _ => ErrorContext::new(error),
    }
}
