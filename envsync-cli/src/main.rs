//! envsync: keep one checkout per git branch in sync with its upstream.
//!
//! # Usage
//!
//! ```text
//! envsync update [<branch> [<revision>]] [--local] [--json]
//! envsync cleanup [--confirm <token>] [--local] [--json]
//! envsync gc [--local]
//! envsync agent start|stop|status
//! ```
//!
//! Every command accepts `--config <path>` (default: `$ENVSYNC_CONFIG`, then
//! `/etc/envsync/agent.yaml`). Without `--local`, repository commands are
//! sent to the running agent.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    agent::AgentCommand, cleanup::CleanupArgs, gc::GcArgs, update::UpdateArgs, GlobalOpts,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "envsync",
    version,
    about = "Mirror a git repository and keep one environment directory per branch",
    long_about = None,
)]
struct Cli {
    /// Agent configuration file.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log engine activity to stderr (repeat for debug output).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Update every branch, or a single branch at an optional revision.
    Update(UpdateArgs),

    /// Remove environments whose branch is gone.
    Cleanup(CleanupArgs),

    /// Compact the repository mirror.
    Gc(GcArgs),

    /// Run or control the background agent.
    Agent {
        #[command(subcommand)]
        command: AgentCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let opts = GlobalOpts {
        config: cli.config,
        verbose: cli.verbose,
    };
    match cli.command {
        Commands::Update(args) => args.run(&opts),
        Commands::Cleanup(args) => args.run(&opts),
        Commands::Gc(args) => args.run(&opts),
        Commands::Agent { command } => commands::agent::run(command, &opts),
    }
}
