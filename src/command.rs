//! Process runner: asynchronous external command execution
//!
//! Commands are described by an immutable [`CommandSpec`], executed with
//! [`run`] / [`run_unchecked`], and their captured output shaped through
//! [`OutputFormat`]. Standard-input writing and the draining of both output
//! pipes run as separate tasks, so a command that emits large output while
//! reading large input cannot deadlock against a full pipe buffer. Each
//! invocation owns its own child process and capture buffers; concurrent
//! invocations share nothing.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Immutable description of one external command invocation
///
/// Built once with the consuming setters, then passed to [`run`] or
/// [`run_unchecked`] any number of times; the runner never mutates it.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use groundcrew::CommandSpec;
///
/// let spec = CommandSpec::new("git")
///     .args(["clone", "--depth", "1", "https://example.com/repo.git"])
///     .current_dir("/tmp/scratch")
///     .timeout(Duration::from_secs(300));
/// assert_eq!(spec.program(), "git");
/// ```
#[derive(Clone, Debug)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    stdin: Option<Vec<u8>>,
    current_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
    timeout: Option<Duration>,
}

impl CommandSpec {
    /// Create a spec for `program` with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            current_dir: None,
            env: Vec::new(),
            timeout: None,
        }
    }

    /// Append one argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments in order
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Bytes to write to the child's standard input; without a payload the
    /// child gets a closed stdin
    #[must_use]
    pub fn stdin_bytes(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    /// Working directory for the child process
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Add one environment override for the child process
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Deadline for the whole invocation; on expiry the child is killed and
    /// the run reports [`Error::CommandTimeout`]
    #[must_use]
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// The program to execute
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The arguments passed after the program, in order
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// How captured stdout/stderr bytes are shaped for the caller
///
/// The conversion is a pure mapping from bytes to the requested shape;
/// nothing is lost silently — `lines` and `single-line` drop at most the one
/// synthetic empty entry a final newline produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Unmodified captured bytes
    RawBytes,
    /// Bytes decoded as UTF-8 text, untrimmed (invalid sequences are
    /// replaced, never dropped)
    Text,
    /// Decoded text split on newline boundaries; a single trailing empty
    /// entry caused by a final newline is dropped
    Lines,
    /// First element of the `Lines` split, or the empty string when the
    /// split is empty
    SingleLine,
}

impl OutputFormat {
    /// Convert captured bytes into this format's shape
    #[must_use]
    pub fn convert(self, bytes: &[u8]) -> ConvertedOutput {
        match self {
            OutputFormat::RawBytes => ConvertedOutput::RawBytes(bytes.to_vec()),
            OutputFormat::Text => ConvertedOutput::Text(decode(bytes)),
            OutputFormat::Lines => ConvertedOutput::Lines(split_lines(bytes)),
            OutputFormat::SingleLine => ConvertedOutput::SingleLine(
                split_lines(bytes).into_iter().next().unwrap_or_default(),
            ),
        }
    }
}

/// One captured stream after applying an [`OutputFormat`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConvertedOutput {
    /// Produced by [`OutputFormat::RawBytes`]
    RawBytes(Vec<u8>),
    /// Produced by [`OutputFormat::Text`]
    Text(String),
    /// Produced by [`OutputFormat::Lines`]
    Lines(Vec<String>),
    /// Produced by [`OutputFormat::SingleLine`]
    SingleLine(String),
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    let mut lines: Vec<String> = decode(bytes).split('\n').map(str::to_string).collect();
    if let Some(last) = lines.last()
        && last.is_empty()
    {
        lines.pop();
    }
    lines
}

/// Captured outcome of a completed process
///
/// Immutable once produced; the conversion accessors derive caller-facing
/// values without touching the captured bytes.
#[derive(Clone, Debug)]
pub struct CommandResult {
    code: i32,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl CommandResult {
    /// Exit code reported by the OS (on Unix, the negated signal number when
    /// the process was killed by a signal)
    #[must_use]
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Whether the process exited with code zero
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Raw captured stdout bytes
    #[must_use]
    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    /// Raw captured stderr bytes
    #[must_use]
    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    /// Captured stdout shaped by `format`
    #[must_use]
    pub fn stdout_as(&self, format: OutputFormat) -> ConvertedOutput {
        format.convert(&self.stdout)
    }

    /// Captured stderr shaped by `format`
    #[must_use]
    pub fn stderr_as(&self, format: OutputFormat) -> ConvertedOutput {
        format.convert(&self.stderr)
    }

    /// Captured stdout decoded as UTF-8 text, untrimmed
    #[must_use]
    pub fn stdout_text(&self) -> String {
        decode(&self.stdout)
    }

    /// Captured stderr decoded as UTF-8 text, untrimmed
    #[must_use]
    pub fn stderr_text(&self) -> String {
        decode(&self.stderr)
    }

    /// Captured stdout split into lines
    #[must_use]
    pub fn stdout_lines(&self) -> Vec<String> {
        split_lines(&self.stdout)
    }

    /// Captured stderr split into lines
    #[must_use]
    pub fn stderr_lines(&self) -> Vec<String> {
        split_lines(&self.stderr)
    }

    /// First line of captured stdout, or the empty string
    #[must_use]
    pub fn stdout_single_line(&self) -> String {
        self.stdout_lines().into_iter().next().unwrap_or_default()
    }
}

/// Run a command to completion, classifying a non-zero exit as an error
///
/// Spawns the process, writes the optional stdin payload, drains stdout and
/// stderr concurrently, and waits for exit.
///
/// # Errors
///
/// - [`Error::Launch`] when the process cannot be spawned
/// - [`Error::CommandExit`] on a non-zero exit, carrying the exit code, the
///   full captured output, and the spec
/// - [`Error::CommandTimeout`] when the spec's deadline expires; the child
///   is killed first
pub async fn run(spec: &CommandSpec) -> Result<CommandResult> {
    let result = run_unchecked(spec).await?;
    if result.success() {
        Ok(result)
    } else {
        Err(Error::CommandExit {
            spec: spec.clone(),
            code: result.code,
            stdout: result.stdout,
            stderr: result.stderr,
        })
    }
}

/// Run a command and return its stdout already shaped by `format`
///
/// Convenience over [`run`] for the common capture-one-stream case; the same
/// errors apply.
pub async fn run_stdout(spec: &CommandSpec, format: OutputFormat) -> Result<ConvertedOutput> {
    Ok(run(spec).await?.stdout_as(format))
}

/// Run a command to completion, reporting any exit code as success
///
/// Identical spawn/drain/harvest machinery to [`run`], but a non-zero exit
/// comes back as an `Ok` [`CommandResult`] — for callers probing tools whose
/// exit codes are informative rather than fatal. Launch and timeout failures
/// still error.
pub async fn run_unchecked(spec: &CommandSpec) -> Result<CommandResult> {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    command.stdin(if spec.stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });

    if let Some(dir) = &spec.current_dir {
        command.current_dir(dir);
    }
    for (key, value) in &spec.env {
        command.env(key, value);
    }

    debug!(program = %spec.program, args = ?spec.args, "spawning command");

    let mut child = command.spawn().map_err(|e| Error::Launch {
        program: spec.program.clone(),
        source: e,
    })?;

    // Each pipe gets its own task: stdin writing and both drains make
    // progress independently, so a child filling one pipe while reading
    // another cannot deadlock against us.
    let stdin_task = match (child.stdin.take(), spec.stdin.clone()) {
        (Some(mut stdin), Some(payload)) => Some(tokio::spawn(async move {
            // A child may exit without consuming its input; that is its call
            if let Err(e) = stdin.write_all(&payload).await
                && e.kind() != std::io::ErrorKind::BrokenPipe
            {
                warn!(error = %e, "failed to write command stdin");
            }
            // stdin drops here, delivering EOF
        })),
        _ => None,
    };
    let stdout_task = drain(child.stdout.take());
    let stderr_task = drain(child.stderr.take());

    // The deadline covers the whole harvest, not just the wait: a grandchild
    // that inherits the output pipes can hold them open past the child's own
    // exit, and the drains would block on it without bound.
    let harvest = async {
        let status = child.wait().await?;
        if let Some(task) = stdin_task {
            // The writer finished once the payload was written or the child went away
            let _ = task.await;
        }
        let stdout = stdout_task
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        let stderr = stderr_task
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        Ok::<_, Error>((status, stdout, stderr))
    };

    let (status, stdout, stderr) = if let Some(limit) = spec.timeout {
        match timeout(limit, harvest).await {
            Ok(harvested) => harvested?,
            Err(_) => {
                // kill() delivers the signal and reaps the child; killing a
                // child that already exited inside the deadline reports
                // InvalidInput
                if let Err(e) = child.kill().await
                    && e.kind() != std::io::ErrorKind::InvalidInput
                {
                    warn!(error = %e, program = %spec.program, "failed to kill timed-out command");
                }
                return Err(Error::CommandTimeout {
                    spec: spec.clone(),
                    timeout: limit,
                });
            }
        }
    } else {
        harvest.await?
    };

    let code = exit_code(&status);
    debug!(
        program = %spec.program,
        code,
        stdout_bytes = stdout.len(),
        stderr_bytes = stderr.len(),
        "command finished"
    );

    Ok(CommandResult {
        code,
        stdout,
        stderr,
    })
}

/// Resolve a bare program name against `PATH`
///
/// Classifies absence the same way a failed spawn would, so orchestration
/// code can fail fast before constructing a [`CommandSpec`].
pub fn locate(program: &str) -> Result<PathBuf> {
    which::which(program).map_err(|e| Error::Launch {
        program: program.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, e),
    })
}

/// Collect everything the child writes to one pipe, until EOF.
fn drain<R>(pipe: Option<R>) -> tokio::task::JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut captured = Vec::new();
        if let Some(mut pipe) = pipe
            && let Err(e) = pipe.read_to_end(&mut captured).await
        {
            warn!(error = %e, "error draining command output pipe");
        }
        captured
    })
}

/// Exit code for a finished process: the real code when the OS reports one,
/// the negated signal number for signal-terminated children on Unix, -1
/// otherwise.
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status
            .code()
            .or_else(|| status.signal().map(|signal| -signal))
            .unwrap_or(-1)
    }
    #[cfg(not(unix))]
    {
        status.code().unwrap_or(-1)
    }
}
