//! Scripted collaborators for engine tests.

use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{LookoutError, Result};
use crate::exec::{CommandExecutor, CommandOutput, CommandSpec};
use crate::fetch::ArtifactFetcher;

enum Reply {
    Ok(CommandOutput),
    Fail { code: i32, stderr: String },
}

/// Answers commands by key: the script if set, else the path, else the exe.
#[derive(Default)]
pub struct ScriptedExecutor {
    replies: Vec<(String, Reply)>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedExecutor {
    pub fn respond(self, key: &str, stdout: &str) -> Self {
        self.respond_with_logs(key, stdout, "")
    }

    pub fn respond_with_logs(mut self, key: &str, stdout: &str, stderr: &str) -> Self {
        self.replies.push((
            key.to_string(),
            Reply::Ok(CommandOutput {
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            }),
        ));
        self
    }

    pub fn fail(mut self, key: &str, code: i32, stderr: &str) -> Self {
        self.replies.push((
            key.to_string(),
            Reply::Fail {
                code,
                stderr: stderr.to_string(),
            },
        ));
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn key(spec: &CommandSpec) -> &str {
        if !spec.script.is_empty() {
            &spec.script
        } else if !spec.path.is_empty() {
            &spec.path
        } else {
            &spec.exe
        }
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(spec.clone());
        }
        let key = Self::key(spec);
        match self.replies.iter().find(|(k, _)| k == key).map(|(_, r)| r) {
            Some(Reply::Ok(out)) => Ok(out.clone()),
            Some(Reply::Fail { code, stderr }) => Err(LookoutError::Execution {
                message: format!("Command '{}' failed:\nexit status: {code}\nstderr:\n{stderr}\n", spec.display()),
                stdout: String::new(),
                stderr: stderr.clone(),
                exit_code: Some(*code),
            }),
            None => Err(LookoutError::Execution {
                message: format!("no scripted reply for '{key}'"),
                stdout: String::new(),
                stderr: String::new(),
                exit_code: None,
            }),
        }
    }
}

/// Pretends to download into `dir` without touching the network.
pub struct StaticFetcher {
    dir: PathBuf,
    broken: bool,
    fetched: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        StaticFetcher {
            dir: dir.into(),
            broken: false,
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn broken() -> Self {
        StaticFetcher {
            broken: true,
            ..StaticFetcher::new("/nonexistent")
        }
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().map(|f| f.clone()).unwrap_or_default()
    }
}

impl ArtifactFetcher for StaticFetcher {
    fn fetch(&self, url: &str, file_name: &str) -> Result<PathBuf> {
        if self.broken {
            return Err(LookoutError::Download {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        if let Ok(mut fetched) = self.fetched.lock() {
            fetched.push(url.to_string());
        }
        Ok(self.dir.join(file_name))
    }
}
