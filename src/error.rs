//! Error types for groundcrew
//!
//! This module provides the classified failures for the library, including:
//! - Process runner errors (launch, non-zero exit, timeout)
//! - Download errors (connection/transport failure, non-success HTTP status)
//! - Filesystem errors carrying the affected path and the OS cause
//!
//! Every variant carries enough structured context for the caller to log or
//! translate the failure without re-running the operation that produced it.
//! The library itself never retries and never downgrades a failure to a
//! warning; everything surfaces here.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::command::CommandSpec;

/// Result type alias for groundcrew operations
pub type Result<T> = std::result::Result<T, Error>;

/// Longest stderr excerpt embedded in a `CommandExit` display message.
/// The full captured bytes stay in the variant payload.
const STDERR_EXCERPT_MAX: usize = 200;

/// Main error type for groundcrew
///
/// This is the primary error type used throughout the library. Each variant
/// includes contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// The external process could not be started (missing executable,
    /// permission denied, unusable working directory)
    #[error("failed to launch '{program}': {source}")]
    Launch {
        /// The program that could not be started
        program: String,
        /// The underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The external process ran to completion but exited with a non-zero code
    #[error("command '{spec}' exited with code {code}: {}", stderr_excerpt(.stderr))]
    CommandExit {
        /// The command that was executed, for logging or re-display
        spec: CommandSpec,
        /// The exit code reported by the OS (on Unix, the negated signal
        /// number when the process was killed by a signal)
        code: i32,
        /// Full captured stdout bytes
        stdout: Vec<u8>,
        /// Full captured stderr bytes
        stderr: Vec<u8>,
    },

    /// The external process exceeded its deadline and was killed
    #[error("command '{spec}' timed out after {timeout:?}")]
    CommandTimeout {
        /// The command that was executed
        spec: CommandSpec,
        /// The deadline that was exceeded
        timeout: Duration,
    },

    /// Connection or transport failure before or during a download
    #[error("download of '{url}' failed: {source}")]
    DownloadConnection {
        /// The URL that was being fetched
        url: String,
        /// The underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// The download server answered with a non-success HTTP status
    #[error("download of '{url}' failed with status {status}")]
    DownloadStatus {
        /// The URL that was being fetched
        url: String,
        /// The HTTP status the server returned
        status: reqwest::StatusCode,
    },

    /// Filesystem operation failed
    #[error("filesystem operation on '{}' failed: {source}", .path.display())]
    Filesystem {
        /// The path the operation was acting on
        path: PathBuf,
        /// The underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// I/O error without a more specific classification (e.g. a write
    /// failure on a caller-owned download destination)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "level")
        key: Option<String>,
    },
}

/// Short, display-safe excerpt of captured stderr for error messages.
fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim_end();
    if trimmed.is_empty() {
        return "(no stderr)".to_string();
    }
    if trimmed.len() <= STDERR_EXCERPT_MAX {
        return trimmed.to_string();
    }
    let mut end = STDERR_EXCERPT_MAX;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}
