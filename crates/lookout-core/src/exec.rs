//! Command execution for observations, actions and the remote envelope.
//!
//! The engine never spawns processes itself. It hands a [`CommandSpec`] to a
//! [`CommandExecutor`], which either launches it on this host
//! ([`LocalExecutor`]) or on a remote host through the system ssh client
//! ([`RemoteExecutor`]).
//!
//! # Dispatch
//! - `path` set:   `exe path args...`
//! - `script` set: script written to a temporary file, `exe <tmpfile> args...`
//! - otherwise:    `exe args...`

use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{LookoutError, Result};
use crate::operation::Action;
use crate::remote::RemoteTarget;

/// One fully resolved command invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub exe: String,
    pub path: String,
    pub script: String,
    pub args: Vec<String>,
    /// Bytes piped to the process's standard input.
    pub stdin: Option<String>,
}

impl From<&Action> for CommandSpec {
    fn from(action: &Action) -> Self {
        CommandSpec {
            exe: action.exe.clone(),
            path: action.path.clone(),
            script: action.script.clone(),
            args: action.args.clone(),
            stdin: None,
        }
    }
}

impl CommandSpec {
    /// Human-readable command line, used in logs and error messages.
    pub fn display(&self) -> String {
        let mut words = vec![self.exe.as_str()];
        if !self.path.is_empty() {
            words.push(&self.path);
        } else if !self.script.is_empty() {
            words.push("<script>");
        }
        words.extend(self.args.iter().map(String::as_str));
        words.join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

pub trait CommandExecutor: Send + Sync {
    /// Run `spec` to completion. A non-zero exit is an `Execution` error that
    /// carries whatever the process wrote before failing.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

impl<T: CommandExecutor + ?Sized> CommandExecutor for std::sync::Arc<T> {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        (**self).run(spec)
    }
}

// ---------------------------------------------------------------------------
// LocalExecutor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct LocalExecutor {
    timeout: Option<Duration>,
}

impl LocalExecutor {
    pub fn new(timeout: Option<Duration>) -> Self {
        LocalExecutor { timeout }
    }
}

impl CommandExecutor for LocalExecutor {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        if spec.exe.is_empty() {
            return Err(execution_error(
                format!("Command '{}' failed:\nmissing executable", spec.display()),
                String::new(),
                String::new(),
                None,
            ));
        }

        // Held until the process exits so the script file outlives it
        let mut script_file = None;
        let mut argv: Vec<String> = Vec::with_capacity(spec.args.len() + 1);
        if !spec.path.is_empty() {
            argv.push(spec.path.clone());
        } else if !spec.script.is_empty() {
            let mut tmp = tempfile::Builder::new()
                .prefix("lookout_script")
                .tempfile()?;
            tmp.write_all(spec.script.as_bytes())?;
            tmp.flush()?;
            argv.push(tmp.path().to_string_lossy().into_owned());
            script_file = Some(tmp);
        }
        argv.extend(spec.args.iter().cloned());

        let cmdline = spec.display();
        tracing::debug!(command = %cmdline, "running local command");

        let mut cmd = Command::new(&spec.exe);
        cmd.args(&argv);
        let finished = run_process(&mut cmd, spec.stdin.as_deref(), self.timeout).map_err(|e| {
            execution_error(
                format!("Command '{cmdline}' failed to start:\n{e}"),
                String::new(),
                String::new(),
                None,
            )
        })?;
        drop(script_file);

        match finished.status {
            None => Err(timed_out(&cmdline, self.timeout)),
            Some(status) if status.success() => Ok(CommandOutput {
                stdout: finished.stdout,
                stderr: finished.stderr,
            }),
            Some(status) => Err(execution_error(
                format!(
                    "Command '{cmdline}' failed:\n{status}\nstderr:\n{}",
                    finished.stderr
                ),
                finished.stdout,
                finished.stderr,
                status.code(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteExecutor
// ---------------------------------------------------------------------------

/// ssh exits with 255 when the connection itself fails.
const SSH_CONNECTION_FAILED: i32 = 255;

/// Runs commands on a remote host, one ssh connection per call.
///
/// `exe` is handed to the remote shell as written so it may reference remote
/// variables such as `$HOME`; every other word is single-quoted.
#[derive(Debug, Clone)]
pub struct RemoteExecutor {
    target: RemoteTarget,
    timeout: Option<Duration>,
}

impl RemoteExecutor {
    pub fn new(target: RemoteTarget, timeout: Option<Duration>) -> Self {
        RemoteExecutor { target, timeout }
    }

    /// Remote shell command line and the bytes to stream on stdin.
    fn remote_command(&self, spec: &CommandSpec) -> Result<(String, Option<String>)> {
        let args: Vec<String> = spec.args.iter().map(|a| shell_quote(a)).collect();
        if !spec.path.is_empty() {
            let mut words = vec![spec.exe.clone(), shell_quote(&spec.path)];
            words.extend(args);
            return Ok((words.join(" "), spec.stdin.clone()));
        }
        if !spec.script.is_empty() {
            if spec.stdin.is_some() {
                return Err(LookoutError::InvalidInput(
                    "cannot stream both a script and stdin to a remote command".into(),
                ));
            }
            let mut invoke = format!("{} \"$f\"", spec.exe);
            for a in &args {
                invoke.push(' ');
                invoke.push_str(a);
            }
            let line = format!(
                "f=$(mktemp) && cat > \"$f\" && {invoke}; rc=$?; rm -f \"$f\"; exit $rc"
            );
            return Ok((line, Some(spec.script.clone())));
        }
        let mut words = vec![spec.exe.clone()];
        words.extend(args);
        Ok((words.join(" "), spec.stdin.clone()))
    }
}

impl CommandExecutor for RemoteExecutor {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let ssh = which::which("ssh")
            .map_err(|e| LookoutError::Transport(format!("ssh client not found: {e}")))?;
        let (line, stdin) = self.remote_command(spec)?;
        let target = &self.target;
        tracing::info!(host = %target.host, user = %target.user, command = %line, "running remote command");

        let port = target.port.to_string();
        let destination = target.destination();
        let mut cmd = Command::new(ssh);
        cmd.args([
            "-p",
            port.as_str(),
            "-o",
            "BatchMode=yes",
            destination.as_str(),
            "--",
            line.as_str(),
        ]);
        let finished = run_process(&mut cmd, stdin.as_deref(), self.timeout).map_err(|e| {
            LookoutError::Transport(format!("failed to open ssh connection to {}: {e}", target.host))
        })?;

        match finished.status {
            None => Err(timed_out(&line, self.timeout)),
            Some(status) if status.success() => Ok(CommandOutput {
                stdout: finished.stdout,
                stderr: finished.stderr,
            }),
            Some(status) if status.code() == Some(SSH_CONNECTION_FAILED) => {
                Err(LookoutError::Transport(format!(
                    "failed to open ssh session to {}: {}",
                    target.host,
                    finished.stderr.trim()
                )))
            }
            Some(status) => {
                let code = status
                    .code()
                    .map_or_else(|| "unknown".to_string(), |c| c.to_string());
                Err(execution_error(
                    format!(
                        "Remote command \"{line}\" exited with non-zero exit status {code}\n\nStdout:\n{}\nStderr:\n{}\n",
                        finished.stdout, finished.stderr
                    ),
                    finished.stdout,
                    finished.stderr,
                    status.code(),
                ))
            }
        }
    }
}

/// Quote `word` for a POSIX shell.
pub fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}

// ---------------------------------------------------------------------------
// Process plumbing
// ---------------------------------------------------------------------------

struct Finished {
    /// `None` when the deadline passed and the process was killed.
    status: Option<ExitStatus>,
    stdout: String,
    stderr: String,
}

fn run_process(cmd: &mut Command, stdin: Option<&str>, timeout: Option<Duration>) -> std::io::Result<Finished> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn()?;

    if let (Some(data), Some(mut pipe)) = (stdin, child.stdin.take()) {
        let data = data.to_owned();
        // A child that exits without reading its input closes the pipe early
        thread::spawn(move || {
            let _ = pipe.write_all(data.as_bytes());
        });
    }
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match timeout {
        None => Some(child.wait()?),
        Some(limit) => wait_with_deadline(&mut child, limit)?,
    };
    if status.is_none() {
        // Descendants may still hold the pipes open, so don't wait on readers
        return Ok(Finished {
            status,
            stdout: String::new(),
            stderr: String::new(),
        });
    }

    Ok(Finished {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut p| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = p.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    let bytes = handle
        .map(|h| h.join().unwrap_or_default())
        .unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn wait_with_deadline(child: &mut Child, limit: Duration) -> std::io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() > limit {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(Duration::from_millis(20));
    }
}

fn execution_error(message: String, stdout: String, stderr: String, exit_code: Option<i32>) -> LookoutError {
    LookoutError::Execution {
        message,
        stdout,
        stderr,
        exit_code,
    }
}

fn timed_out(cmdline: &str, timeout: Option<Duration>) -> LookoutError {
    let secs = timeout.map(|t| t.as_secs_f64()).unwrap_or_default();
    execution_error(
        format!("Command '{cmdline}' timed out after {secs}s"),
        String::new(),
        String::new(),
        None,
    )
}
