//! # groundcrew
//!
//! Async utility substrate for services that orchestrate external work:
//! processes, downloads, filesystem cleanup, and per-task log context.
//!
//! ## Design Philosophy
//!
//! - **Structured failures** - every error names the step that failed and
//!   carries what the caller needs to report it
//! - **Bounded memory** - downloads stream in chunks and process output
//!   drains concurrently; nothing buffers an unbounded body
//! - **Library-first** - no CLI or daemon, purely a Rust crate for embedding
//! - **Context everywhere** - one label per unit of work, stamped into every
//!   log record it emits
//!
//! ## Quick Start
//!
//! ```no_run
//! use groundcrew::{CommandSpec, OutputFormat, command, log_context};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     groundcrew::logging::init(&groundcrew::LogSettings::default())?;
//!
//!     log_context::scope("build-4721", async {
//!         // Revision of the sources we are about to build
//!         let spec = CommandSpec::new("git").args(["rev-parse", "HEAD"]);
//!         let head = command::run_stdout(&spec, OutputFormat::SingleLine).await?;
//!         tracing::info!(?head, "sources resolved");
//!
//!         // Fetch the toolchain archive straight to disk
//!         let mut file = tokio::fs::File::create("/tmp/toolchain.tar.gz").await?;
//!         groundcrew::download("https://example.com/toolchain.tar.gz", &mut file).await?;
//!
//!         // Drop the scratch space left by the previous run
//!         groundcrew::remove_tree("/tmp/scratch").await?;
//!         Ok::<_, groundcrew::Error>(())
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Process runner: spawn, feed, drain, classify
pub mod command;
/// Streamed HTTP downloads
pub mod download;
/// Error types
pub mod error;
/// Async filesystem cleanup
pub mod fs;
/// Per-task log context labels
pub mod log_context;
/// Logging pipeline and settings
pub mod logging;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use command::{CommandResult, CommandSpec, ConvertedOutput, OutputFormat};
pub use download::{DownloadOutcome, download, download_with};
pub use error::{Error, Result};
pub use fs::remove_tree;
pub use logging::{LogPipeline, LogSettings};
