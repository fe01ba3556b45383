mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::{
    observe::ObserveSubcommand, react::ReactSubcommand, run::RunSubcommand,
    setup::SetupSubcommand, EngineArgs,
};

#[derive(Parser)]
#[command(
    name = "lookout",
    about = "Declarative observe, act and react: detect drift and correct it",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every observation and print the results
    Observe {
        #[command(subcommand)]
        subcommand: ObserveSubcommand,
    },

    /// Evaluate observations, then resolve every reaction against them
    React {
        #[command(subcommand)]
        subcommand: ReactSubcommand,
    },

    /// Run one named action
    Run {
        #[command(subcommand)]
        subcommand: RunSubcommand,
    },

    /// Install the lookout client on a target
    Setup {
        #[command(subcommand)]
        subcommand: SetupSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    // stdout carries the JSON report, so diagnostics go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Observe { subcommand } => cmd::observe::run(subcommand, &cli.engine),
        Commands::React { subcommand } => cmd::react::run(subcommand, &cli.engine),
        Commands::Run { subcommand } => cmd::run::run(subcommand, &cli.engine),
        Commands::Setup { subcommand } => cmd::setup::run(subcommand, &cli.engine),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
