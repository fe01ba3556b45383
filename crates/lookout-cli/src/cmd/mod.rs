pub mod observe;
pub mod react;
pub mod run;
pub mod setup;

use anyhow::Context;
use clap::Args;
use lookout_core::exec::RemoteExecutor;
use lookout_core::io::SpecInput;
use lookout_core::remote::RemoteTarget;
use lookout_core::{EngineConfig, Operations};
use std::path::PathBuf;
use std::time::Duration;

/// Engine settings shared by every command.
#[derive(Args)]
pub struct EngineArgs {
    /// Directory for downloaded implement sources (default: ~/.lookout/impls)
    #[arg(long, global = true, env = "LOOKOUT_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Number of observations to evaluate at once
    #[arg(long, global = true, env = "LOOKOUT_JOBS", default_value_t = 1)]
    jobs: usize,

    /// Kill any command still running after this many seconds
    #[arg(long, global = true, env = "LOOKOUT_TIMEOUT")]
    timeout: Option<u64>,
}

impl EngineArgs {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    pub fn config(&self) -> anyhow::Result<EngineConfig> {
        let config = match &self.cache_dir {
            Some(dir) => EngineConfig::new(dir.clone()),
            None => EngineConfig::for_current_user()?,
        };
        Ok(config.with_jobs(self.jobs).with_timeout(self.timeout()))
    }
}

/// Where to read spec documents from.
#[derive(Args)]
pub struct InputArgs {
    /// Path to a spec YAML file; repeat to merge several (must use one of --file or --stdin)
    #[arg(long = "file", short = 'f')]
    files: Vec<PathBuf>,

    /// Read the spec from stdin (must use one of --file or --stdin)
    #[arg(long)]
    stdin: bool,
}

impl InputArgs {
    pub fn load(self) -> anyhow::Result<Operations> {
        let input = SpecInput::choose(self.files, self.stdin)?;
        let ops = input.load().context("failed to load spec")?;
        tracing::debug!(
            observations = ops.observations.len(),
            reactions = ops.reactions.len(),
            actions = ops.actions.len(),
            implements = ops.implements.len(),
            "spec loaded"
        );
        Ok(ops)
    }
}

/// How to reach a remote target over ssh.
#[derive(Args)]
pub struct SshArgs {
    /// Username to use when connecting via SSH
    #[arg(long, short = 'u', env = "USER", default_value = "")]
    user: String,

    /// Port to use for ssh connections
    #[arg(long, short = 'p', default_value = "22")]
    port: String,
}

impl SshArgs {
    pub fn executor(&self, host: &str, engine: &EngineArgs) -> anyhow::Result<RemoteExecutor> {
        let target = RemoteTarget::new(&self.user, host, &self.port)?;
        Ok(RemoteExecutor::new(target, engine.timeout()))
    }
}
