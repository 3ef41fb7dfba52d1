//! External command execution.
//!
//! Every tool the pipeline drives (terraform, terragrunt, the rule engine) goes through a
//! [`ProcessRunner`]. The system implementation spawns a child process synchronously,
//! drains its pipes on helper threads and optionally enforces a timeout by killing the
//! child. Tests substitute their own runner.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::debug;

/// Stderr kept on a failed command is capped to this many bytes.
const MAX_STDERR_BYTES: usize = 64 * 1024;

/// Poll interval while waiting on a child with a deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("executable not found: {program}")]
    ExecutableNotFound { program: String },

    #[error("working directory does not exist: {}", .path.display())]
    MissingWorkingDir { path: PathBuf },

    #[error("command '{command}' failed with {}", exit_description(.exit_code))]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("command '{command}' timed out after {}s", .timeout.as_secs_f64())]
    TimedOut { command: String, timeout: Duration },

    #[error("failed to run '{command}': {source}")]
    Io {
        command: String,
        source: std::io::Error,
    },
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl ProcessError {
    /// Exit code of a failed command, when there was one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }

    /// Captured stderr of a failed command (empty when output was not captured).
    pub fn stderr(&self) -> &str {
        match self {
            Self::CommandFailed { stderr, .. } => stderr,
            _ => "",
        }
    }
}

/// A fully described command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Replacement environment. `None` inherits the parent environment.
    pub env: Option<BTreeMap<String, String>>,
    /// Capture stdout/stderr. When false, the child's stdout is forwarded to our stderr
    /// and its stderr is inherited, so reports written to stdout stay clean.
    pub capture_output: bool,
    /// Fail with [`ProcessError::CommandFailed`] on a non-zero exit.
    pub check: bool,
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: None,
            capture_output: false,
            check: true,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn capture_output(mut self) -> Self {
        self.capture_output = true;
        self
    }

    /// Return the output even when the command exits non-zero.
    pub fn unchecked(mut self) -> Self {
        self.check = false;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Human-readable command line, used in logs and error messages.
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| {
                if part.is_empty() || part.contains(char::is_whitespace) {
                    format!("{:?}", part)
                } else {
                    part.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Environment for a child process: the full parent environment when `inherit` is set,
/// otherwise `PATH` alone. `overlay` is applied on top in both cases.
pub fn child_environment(
    inherit: bool,
    overlay: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut env: BTreeMap<String, String> = if inherit {
        std::env::vars().collect()
    } else {
        BTreeMap::from([(
            "PATH".to_string(),
            std::env::var("PATH").unwrap_or_default(),
        )])
    };
    env.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
    env
}

/// Result of a completed command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external commands on behalf of the pipeline.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ProcessError>;
}

/// [`ProcessRunner`] backed by `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ProcessError> {
        let command_line = invocation.command_line();

        if let Some(cwd) = &invocation.cwd {
            if !cwd.is_dir() {
                return Err(ProcessError::MissingWorkingDir { path: cwd.clone() });
            }
        }

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args).stdin(Stdio::null());
        if let Some(cwd) = &invocation.cwd {
            cmd.current_dir(cwd);
        }
        if let Some(env) = &invocation.env {
            cmd.env_clear().envs(env);
        }
        #[cfg(unix)]
        if invocation.timeout.is_some() {
            use std::os::unix::process::CommandExt;
            // own group, so a timeout reaches grandchildren too
            cmd.process_group(0);
        }
        if invocation.capture_output {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::from(std::io::stderr()))
                .stderr(Stdio::inherit());
        }

        debug!(command = %command_line, cwd = ?invocation.cwd, "spawning command");

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProcessError::ExecutableNotFound {
                    program: invocation.program.clone(),
                }
            } else {
                ProcessError::Io {
                    command: command_line.clone(),
                    source: e,
                }
            }
        })?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match invocation.timeout {
            None => child.wait().map(Some),
            Some(timeout) => wait_timeout(&mut child, timeout),
        }
        .map_err(|e| ProcessError::Io {
            command: command_line.clone(),
            source: e,
        })?;

        let Some(status) = status else {
            kill_tree(&mut child);
            let _ = child.wait();
            // descendants outside the group may still hold the pipes; detach the drains
            drop(stdout);
            drop(stderr);
            return Err(ProcessError::TimedOut {
                command: command_line,
                timeout: invocation.timeout.unwrap_or_default(),
            });
        };

        let output = ProcessOutput {
            stdout: collect(stdout),
            stderr: collect(stderr),
            exit_code: status.code(),
        };

        debug!(command = %command_line, exit_code = ?output.exit_code, "command finished");

        if invocation.check && !status.success() {
            let mut stderr = output.stderr;
            truncate_utf8(&mut stderr, MAX_STDERR_BYTES);
            return Err(ProcessError::CommandFailed {
                command: command_line,
                exit_code: output.exit_code,
                stderr,
            });
        }

        Ok(output)
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(pid) = i32::try_from(child.id()) else {
        let _ = child.kill();
        return;
    };
    if killpg(Pid::from_raw(pid), Signal::SIGKILL).is_err() {
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    let _ = child.kill();
}

fn wait_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        match child.try_wait()? {
            Some(status) => return Ok(Some(status)),
            None => {
                if start.elapsed() >= timeout {
                    return Ok(None);
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

fn truncate_utf8(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}
