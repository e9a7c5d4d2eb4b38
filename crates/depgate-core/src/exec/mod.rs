//! Command execution engine: spawn, collect, timeout, classify.
//!
//! Every external tool invocation in the pipeline goes through
//! [`execute`]. The engine resolves the executable, runs the process as a
//! monitored tokio task (or behind a pseudo-terminal for streaming
//! profiles), enforces a wall-clock timeout with a monotonic clock, and
//! classifies the exit status against a caller-supplied allow-list.
//!
//! The engine never propagates a fault to its caller: every internal
//! error becomes a `CommandResult::Error { message }`.

pub mod pty;
pub mod stream;

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::domain::error::{DepgateError, ExecError};
use crate::obs;
use stream::StreamProfile;

/// Default wall-clock timeout for one command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Poll interval for the buffered collector. Bounds timeout-detection
/// latency without busy-spinning.
const BUFFERED_POLL: Duration = Duration::from_secs(5);

/// Sink for live progress output. No-op by default; the CLI installs a
/// stderr sink when verbose logging is requested.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, text: &str);
}

/// Discards all progress output.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _text: &str) {}
}

/// Writes progress output to stderr as it arrives.
#[derive(Debug, Default)]
pub struct StderrSink;

impl ProgressSink for StderrSink {
    fn emit(&self, text: &str) {
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(text.as_bytes());
        let _ = stderr.flush();
    }
}

/// Immutable description of one external command invocation.
#[derive(Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub allowed_exit_codes: Vec<i32>,
    pub timeout: Duration,
    pub streaming: bool,
    pub profile: StreamProfile,
    pub sink: Arc<dyn ProgressSink>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            allowed_exit_codes: vec![0],
            timeout: DEFAULT_TIMEOUT,
            streaming: false,
            profile: StreamProfile::PassThrough,
            sink: Arc::new(NullSink),
        }
    }

    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn allowed_exit_codes(mut self, codes: Vec<i32>) -> Self {
        self.allowed_exit_codes = codes;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run behind a pseudo-terminal and render output incrementally with
    /// the given profile. Required for tools that only enable rich output
    /// when attached to a terminal.
    pub fn streaming(mut self, profile: StreamProfile) -> Self {
        self.streaming = true;
        self.profile = profile;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Human-readable command line for diagnostics.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("cwd", &self.cwd)
            .field("allowed_exit_codes", &self.allowed_exit_codes)
            .field("timeout", &self.timeout)
            .field("streaming", &self.streaming)
            .finish()
    }
}

/// Outcome of one command invocation.
///
/// `output` is always the full concatenation of everything the process
/// wrote (stdout + stderr), independent of whether incremental rendering
/// also occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Exit status was in the allow-list.
    Success { output: String },

    /// Process exited outside the allow-list.
    Failed { exit_code: i32, output: String },

    /// The command could not be run to completion (executable missing,
    /// timeout, internal fault).
    Error { message: String },
}

impl CommandResult {
    /// The raw output, when the process ran at all.
    pub fn output(&self) -> Option<&str> {
        match self {
            CommandResult::Success { output } | CommandResult::Failed { output, .. } => {
                Some(output)
            }
            CommandResult::Error { .. } => None,
        }
    }

    /// Adapter helper: unwrap success or convert into a typed error that
    /// embeds the failing command and its captured output.
    pub fn require_success(self, command: &str) -> crate::domain::Result<String> {
        match self {
            CommandResult::Success { output } => Ok(output),
            CommandResult::Failed { exit_code, output } => Err(DepgateError::CommandFailed {
                command: command.to_string(),
                exit_code,
                output,
            }),
            CommandResult::Error { message } => Err(DepgateError::Exec(message)),
        }
    }
}

/// Execute one command to completion.
///
/// Resolution, spawning, collection, timeout and classification per the
/// spec of [`CommandSpec`]; any internal fault is converted into
/// `CommandResult::Error` rather than propagated.
pub async fn execute(spec: CommandSpec) -> CommandResult {
    let started = Instant::now();
    let result = match run(&spec).await {
        Ok(result) => result,
        Err(err) => CommandResult::Error {
            message: err.to_string(),
        },
    };
    obs::emit_command_finished(
        &spec.display(),
        &result,
        started.elapsed().as_millis() as u64,
    );
    result
}

async fn run(spec: &CommandSpec) -> Result<CommandResult, ExecError> {
    resolve_executable(&spec.program)?;
    if spec.streaming {
        pty::execute_streaming(spec).await
    } else {
        execute_buffered(spec).await
    }
}

/// Buffered collector: pipe stdout/stderr into reader tasks and poll the
/// child on a fixed interval, emitting "still running" progress events on
/// each miss until the deadline.
async fn execute_buffered(spec: &CommandSpec) -> Result<CommandResult, ExecError> {
    let started = Instant::now();

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &spec.cwd {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn().map_err(|err| ExecError::Spawn {
        program: spec.program.clone(),
        message: err.to_string(),
    })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = stdout {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = stderr {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });

    let status = loop {
        let remaining = spec.timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            let _ = child.start_kill();
            let _ = child.wait().await;
            stdout_task.abort();
            stderr_task.abort();
            return Err(ExecError::Timeout(spec.timeout.as_millis() as u64));
        }
        match tokio::time::timeout(remaining.min(BUFFERED_POLL), child.wait()).await {
            Ok(status) => break status?,
            Err(_) => {
                spec.sink.emit(&format!(
                    "[depgate] {} still running ({}s elapsed)\n",
                    spec.program,
                    started.elapsed().as_secs()
                ));
            }
        }
    };

    let mut output = String::new();
    if let Ok(buf) = stdout_task.await {
        output.push_str(&String::from_utf8_lossy(&buf));
    }
    if let Ok(buf) = stderr_task.await {
        output.push_str(&String::from_utf8_lossy(&buf));
    }

    Ok(classify(spec, status.code().unwrap_or(-1), output))
}

pub(crate) fn classify(spec: &CommandSpec, exit_code: i32, output: String) -> CommandResult {
    if spec.allowed_exit_codes.contains(&exit_code) {
        CommandResult::Success { output }
    } else {
        CommandResult::Failed { exit_code, output }
    }
}

/// Resolve a program name against `PATH`, failing fast when absent.
fn resolve_executable(program: &str) -> Result<PathBuf, ExecError> {
    let not_found = || ExecError::ExecutableNotFound(program.to_string());

    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return if is_executable(candidate) {
            Ok(candidate.to_path_buf())
        } else {
            Err(not_found())
        };
    }

    let path = std::env::var_os("PATH").ok_or_else(not_found)?;
    for dir in std::env::split_paths(&path) {
        let full = dir.join(program);
        if is_executable(&full) {
            return Ok(full);
        }
    }
    Err(not_found())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
