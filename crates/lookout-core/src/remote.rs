//! Remote invocation envelope.
//!
//! Remote observe/react/run do not evaluate anything on this host. The merged
//! spec is re-serialised and piped to the lookout client installed on the target,
//! which runs the same verb locally with `--stdin`. `setup` installs that client.

use serde::Serialize;

use crate::error::{LookoutError, Result};
use crate::exec::{CommandExecutor, CommandSpec};
use crate::operation::Operations;
use crate::{paths, version};

/// Validated ssh destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub user: String,
    pub host: String,
    pub port: u16,
}

impl RemoteTarget {
    pub fn new(user: &str, host: &str, port: &str) -> Result<Self> {
        if user.is_empty() {
            return Err(LookoutError::InvalidInput("username must not be empty".into()));
        }
        if host.is_empty() {
            return Err(LookoutError::InvalidInput("target must not be empty".into()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| LookoutError::InvalidInput(format!("port '{port}' is not a number")))?;
        Ok(RemoteTarget {
            user: user.to_string(),
            host: host.to_string(),
            port,
        })
    }

    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

pub fn observe(executor: &dyn CommandExecutor, ops: &Operations) -> Result<String> {
    invoke(executor, &["observe", "local", "--stdin"], ops)
}

pub fn react(executor: &dyn CommandExecutor, ops: &Operations) -> Result<String> {
    invoke(executor, &["react", "local", "--stdin"], ops)
}

pub fn run(executor: &dyn CommandExecutor, ops: &Operations, action: &str) -> Result<String> {
    if action.is_empty() {
        return Err(LookoutError::InvalidInput("action name must not be empty".into()));
    }
    invoke(executor, &["run", "local", action, "--stdin"], ops)
}

fn invoke(executor: &dyn CommandExecutor, verb: &[&str], ops: &Operations) -> Result<String> {
    let spec = CommandSpec {
        exe: paths::REMOTE_BIN.to_string(),
        args: verb.iter().map(|s| s.to_string()).collect(),
        stdin: Some(serde_yaml::to_string(ops)?),
        ..Default::default()
    };
    executor
        .run(&spec)
        .map(|out| out.stdout)
        .map_err(|e| client_failed("lookout client on remote target", e))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupReport {
    pub ok: bool,
    pub logs: String,
}

/// Shell script that installs the release client for this version.
pub fn setup_script() -> String {
    format!(
        r#"set -e
mkdir -p "$HOME/{bin}" 1>&2
mkdir -p "$HOME/{impls}" 1>&2
curl -fsSL {url} > "$HOME/{bin}/lookout"
chmod 755 "$HOME/{bin}/lookout" 1>&2
"#,
        bin = paths::BIN_DIR,
        impls = paths::IMPLS_DIR,
        url = version::release_artifact("lookout"),
    )
}

/// Provision the target: cache directories plus the client binary.
pub fn setup(executor: &dyn CommandExecutor) -> Result<SetupReport> {
    let spec = CommandSpec {
        exe: "sh".to_string(),
        args: vec!["-c".to_string(), setup_script()],
        ..Default::default()
    };
    let out = executor
        .run(&spec)
        .map_err(|e| client_failed("attempt to download lookout client on remote target", e))?;
    Ok(SetupReport {
        ok: true,
        logs: out.stderr.trim().to_string(),
    })
}

fn client_failed(what: &str, err: LookoutError) -> LookoutError {
    match err {
        LookoutError::Execution {
            stdout,
            stderr,
            exit_code,
            ..
        } => {
            let code = exit_code.map_or_else(|| "unknown".to_string(), |c| c.to_string());
            LookoutError::Execution {
                message: format!(
                    "{what} returned non-zero exit code {code}\n\nStdout:\n{stdout}\nStderr:\n{stderr}\n"
                ),
                stdout,
                stderr,
                exit_code,
            }
        }
        other => other,
    }
}
