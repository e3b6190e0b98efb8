//! Logging pipeline
//!
//! Console and file sinks over `tracing`, with every record stamped with the
//! active [`log_context`](crate::log_context) label:
//!
//! ```text
//! 2026-03-01T09:15:42.123Z [ INFO] [adjust-4711] groundcrew::command:312 command finished code=0
//! ```
//!
//! The `RUST_LOG` environment variable, when set, overrides the configured
//! level filter. Install once per process with [`init`], or hold a
//! [`LogPipeline`] and scope it to one thread with
//! [`set_default`](LogPipeline::set_default) in tests.

use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::error::{Error, Result};
use crate::log_context;

/// Settings for the logging pipeline
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogSettings {
    /// Default level filter, e.g. `"info"` or `"groundcrew=debug"`;
    /// `RUST_LOG` wins when set
    #[serde(default = "default_level")]
    pub level: String,
    /// Also append records to this file; parent directories are created
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Write records to stderr
    #[serde(default = "default_console")]
    pub console: bool,
    /// Color the level on the console sink
    #[serde(default)]
    pub ansi: bool,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_console() -> bool {
    true
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
            console: default_console(),
            ansi: false,
        }
    }
}

/// A configured logging pipeline, ready to install
#[derive(Debug)]
pub struct LogPipeline {
    dispatch: tracing::Dispatch,
}

impl LogPipeline {
    /// Assemble the sinks and filter described by `settings`
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the level filter does not parse,
    /// [`Error::Filesystem`] when the log file cannot be opened.
    pub fn build(settings: &LogSettings) -> Result<Self> {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&settings.level))
            .map_err(|e| Error::Config {
                message: format!("invalid log level filter '{}': {e}", settings.level),
                key: Some("level".to_string()),
            })?;

        let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

        if settings.console {
            layers.push(
                tracing_subscriber::fmt::layer()
                    .event_format(TaskEventFormat)
                    .with_ansi(settings.ansi)
                    .with_writer(io::stderr)
                    .boxed(),
            );
        }

        if let Some(path) = &settings.file {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent).map_err(|e| Error::Filesystem {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| Error::Filesystem {
                    path: path.clone(),
                    source: e,
                })?;
            layers.push(
                tracing_subscriber::fmt::layer()
                    .event_format(TaskEventFormat)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .boxed(),
            );
        }

        let subscriber = Registry::default().with(layers).with(filter);
        Ok(Self {
            dispatch: tracing::Dispatch::new(subscriber),
        })
    }

    /// Install as the process-wide default subscriber
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when a global subscriber is already installed.
    pub fn install(self) -> Result<()> {
        tracing::dispatcher::set_global_default(self.dispatch).map_err(|_| Error::Config {
            message: "a global logging subscriber is already installed".to_string(),
            key: None,
        })
    }

    /// Install for the current thread only, until the guard drops
    #[must_use]
    pub fn set_default(&self) -> tracing::dispatcher::DefaultGuard {
        tracing::dispatcher::set_default(&self.dispatch)
    }
}

/// Build the pipeline from `settings` and install it process-wide
///
/// # Errors
///
/// Everything [`LogPipeline::build`] and [`LogPipeline::install`] report.
pub fn init(settings: &LogSettings) -> Result<()> {
    LogPipeline::build(settings)?.install()
}

/// Event formatter stamping the task's log context label into every record
///
/// Layout: `{timestamp} [{level}] [{context}] {target}:{line} {message fields}`.
/// Public so callers can attach the same layout, context label included, to
/// sinks of their own:
///
/// ```
/// use tracing_subscriber::{fmt, prelude::*};
/// use groundcrew::logging::TaskEventFormat;
///
/// let subscriber = tracing_subscriber::registry()
///     .with(fmt::layer().event_format(TaskEventFormat).with_writer(std::io::stderr));
/// # let _ = subscriber;
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct TaskEventFormat;

impl<S, N> FormatEvent<S, N> for TaskEventFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();

        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");
        write!(writer, "{timestamp} ")?;

        if writer.has_ansi_escapes() {
            write!(writer, "[{}{:>5}{RESET}] ", level_style(*meta.level()), meta.level())?;
        } else {
            write!(writer, "[{:>5}] ", meta.level())?;
        }

        write!(writer, "[{}] ", log_context::current())?;

        write!(writer, "{}", meta.target())?;
        if let Some(line) = meta.line() {
            write!(writer, ":{line}")?;
        }
        write!(writer, " ")?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

const RESET: &str = "\x1b[0m";

fn level_style(level: Level) -> &'static str {
    if level == Level::ERROR {
        "\x1b[31m"
    } else if level == Level::WARN {
        "\x1b[33m"
    } else if level == Level::INFO {
        "\x1b[32m"
    } else if level == Level::DEBUG {
        "\x1b[34m"
    } else {
        "\x1b[35m"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_only(level: &str, path: PathBuf) -> LogSettings {
        LogSettings {
            level: level.to_string(),
            file: Some(path),
            console: false,
            ansi: false,
        }
    }

    // -----------------------------------------------------------------------
    // Settings surface
    // -----------------------------------------------------------------------

    #[test]
    fn settings_default_to_plain_info_on_stderr() {
        let settings = LogSettings::default();
        assert_eq!(settings.level, "info");
        assert!(settings.file.is_none());
        assert!(settings.console);
        assert!(!settings.ansi);
    }

    #[test]
    fn settings_deserialize_from_an_empty_document() {
        let settings: LogSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.level, "info");
        assert!(settings.console);
    }

    #[test]
    fn settings_deserialize_overrides() {
        let settings: LogSettings = serde_json::from_str(
            r#"{"level": "debug", "file": "/var/log/app.log", "console": false, "ansi": false}"#,
        )
        .unwrap();
        assert_eq!(settings.level, "debug");
        assert_eq!(settings.file, Some(PathBuf::from("/var/log/app.log")));
        assert!(!settings.console);
        assert!(!settings.ansi);
    }

    // -----------------------------------------------------------------------
    // Pipeline construction
    // -----------------------------------------------------------------------

    #[test]
    fn build_rejects_a_bad_level_filter() {
        // RUST_LOG takes precedence over the configured level; skip when set
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let settings = LogSettings {
            level: "app=notalevel".to_string(),
            ..LogSettings::default()
        };
        let error = LogPipeline::build(&settings).unwrap_err();
        match error {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("level")),
            other => panic!("expected Config, got: {other:?}"),
        }
    }

    #[test]
    fn build_without_sinks_still_succeeds() {
        let settings = LogSettings {
            console: false,
            ..LogSettings::default()
        };
        assert!(LogPipeline::build(&settings).is_ok());
    }

    #[test]
    fn build_creates_missing_log_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/logs/app.log");
        LogPipeline::build(&file_only("info", path.clone())).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn an_unusable_log_path_is_a_filesystem_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let error = LogPipeline::build(&file_only("info", blocker.join("app.log"))).unwrap_err();
        assert!(matches!(error, Error::Filesystem { .. }), "got: {error:?}");
    }

    // -----------------------------------------------------------------------
    // Record layout through the file sink
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn records_carry_the_active_task_label() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("task.log");
        let pipeline = LogPipeline::build(&file_only("debug", path.clone())).unwrap();
        let guard = pipeline.set_default();

        log_context::scope("adjust-511", async {
            tracing::info!("labeled record");
        })
        .await;
        tracing::info!("unlabeled record");

        drop(guard);
        let contents = std::fs::read_to_string(&path).unwrap();

        let labeled = contents
            .lines()
            .find(|line| line.contains("labeled record") && !line.contains("unlabeled"))
            .expect("labeled record missing");
        assert!(labeled.contains("[adjust-511] "), "line: {labeled}");

        let unlabeled = contents
            .lines()
            .find(|line| line.contains("unlabeled record"))
            .expect("unlabeled record missing");
        assert!(
            unlabeled.contains(&format!("[{}] ", log_context::NO_CONTEXT)),
            "line: {unlabeled}"
        );
    }

    #[tokio::test]
    async fn record_layout_has_timestamp_level_target_and_fields() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("layout.log");
        let pipeline = LogPipeline::build(&file_only("debug", path.clone())).unwrap();
        let guard = pipeline.set_default();

        tracing::warn!(answer = 42, "layout check");

        drop(guard);
        let contents = std::fs::read_to_string(&path).unwrap();
        let line = contents
            .lines()
            .find(|line| line.contains("layout check"))
            .expect("record missing");

        let timestamp = line.split(' ').next().unwrap();
        chrono::DateTime::parse_from_rfc3339(timestamp)
            .unwrap_or_else(|e| panic!("bad timestamp '{timestamp}': {e}"));

        assert!(line.contains("[ WARN] "), "line: {line}");
        assert!(line.contains("groundcrew::logging"), "line: {line}");
        assert!(line.contains("answer=42"), "line: {line}");
        // level filter at debug lets the record through; the file sink never colors
        assert!(!line.contains('\x1b'), "line: {line}");
    }
}
