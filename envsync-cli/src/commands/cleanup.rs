//! `envsync cleanup`: remove environments with no live branch.

use anyhow::Result;
use clap::Args;

use envsync_sync::Operation;

use super::{execute, output, print_json, GlobalOpts};

/// Arguments for `envsync cleanup`.
#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Proceed only if this is `yes`, `1` or `true`.
    #[arg(long, value_name = "TOKEN")]
    pub confirm: Option<String>,

    /// Run in this process instead of asking the agent.
    #[arg(long)]
    pub local: bool,

    /// Emit the raw report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl CleanupArgs {
    pub fn run(self, opts: &GlobalOpts) -> Result<()> {
        let report = execute(
            opts,
            Operation::Cleanup {
                confirm: self.confirm,
            },
            self.local,
        )?;
        if self.json {
            return print_json(&report);
        }
        output::print_cleanup(&report);
        Ok(())
    }
}
