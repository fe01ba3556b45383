use super::{EngineArgs, InputArgs, SshArgs};
use crate::output::{print_json, print_raw};
use clap::Subcommand;
use lookout_core::{remote, Engine};

#[derive(Subcommand)]
pub enum RunSubcommand {
    /// Run an action on this host
    Local {
        /// Action name
        action: String,
        #[command(flatten)]
        input: InputArgs,
    },

    /// Run an action on a remote target through its lookout client
    Remote {
        /// Action name
        action: String,
        /// Host to connect to
        target: String,
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        ssh: SshArgs,
    },
}

pub fn run(subcmd: RunSubcommand, engine: &EngineArgs) -> anyhow::Result<()> {
    match subcmd {
        RunSubcommand::Local { action, input } => {
            let ops = input.load()?;
            let results = Engine::local(engine.config()?).run(&ops, &action)?;
            print_json(&results)
        }
        RunSubcommand::Remote {
            action,
            target,
            input,
            ssh,
        } => {
            let executor = ssh.executor(&target, engine)?;
            let ops = input.load()?;
            print_raw(&remote::run(&executor, &ops, &action)?)
        }
    }
}
