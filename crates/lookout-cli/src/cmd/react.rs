use super::{EngineArgs, InputArgs, SshArgs};
use crate::output::{print_json, print_raw};
use clap::Subcommand;
use lookout_core::{remote, Engine};

#[derive(Subcommand)]
pub enum ReactSubcommand {
    /// Observe and react on this host
    Local {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Observe and react on a remote target through its lookout client
    Remote {
        /// Host to connect to
        target: String,
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        ssh: SshArgs,
    },
}

pub fn run(subcmd: ReactSubcommand, engine: &EngineArgs) -> anyhow::Result<()> {
    match subcmd {
        ReactSubcommand::Local { input } => {
            let ops = input.load()?;
            let results = Engine::local(engine.config()?).react(&ops);
            if results.failed_reactions > 0 {
                tracing::warn!(
                    failed = results.failed_reactions,
                    total = results.total_reactions,
                    "some reactions failed"
                );
            }
            print_json(&results)
        }
        ReactSubcommand::Remote { target, input, ssh } => {
            let executor = ssh.executor(&target, engine)?;
            let ops = input.load()?;
            print_raw(&remote::react(&executor, &ops)?)
        }
    }
}
