use super::{EngineArgs, SshArgs};
use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use lookout_core::remote;

#[derive(Subcommand)]
pub enum SetupSubcommand {
    /// Create the cache directories and download the client on a remote target
    Remote {
        /// Host to connect to
        target: String,
        #[command(flatten)]
        ssh: SshArgs,
    },
}

pub fn run(subcmd: SetupSubcommand, engine: &EngineArgs) -> anyhow::Result<()> {
    match subcmd {
        SetupSubcommand::Remote { target, ssh } => {
            let executor = ssh.executor(&target, engine)?;
            let report = remote::setup(&executor)
                .with_context(|| format!("setup of {target} failed"))?;
            print_json(&report)
        }
    }
}
