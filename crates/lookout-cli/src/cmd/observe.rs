use super::{EngineArgs, InputArgs, SshArgs};
use crate::output::{print_json, print_raw};
use clap::Subcommand;
use lookout_core::{remote, Engine};

#[derive(Subcommand)]
pub enum ObserveSubcommand {
    /// Run observations on this host
    Local {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Run observations on a remote target through its lookout client
    Remote {
        /// Host to connect to
        target: String,
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        ssh: SshArgs,
    },
}

pub fn run(subcmd: ObserveSubcommand, engine: &EngineArgs) -> anyhow::Result<()> {
    match subcmd {
        ObserveSubcommand::Local { input } => {
            let ops = input.load()?;
            let results = Engine::local(engine.config()?).observe(&ops);
            print_json(&results)
        }
        ObserveSubcommand::Remote { target, input, ssh } => {
            let executor = ssh.executor(&target, engine)?;
            let ops = input.load()?;
            print_raw(&remote::observe(&executor, &ops)?)
        }
    }
}
