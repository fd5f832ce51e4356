//! `envsync gc`: compact the mirror.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use envsync_sync::Operation;

use super::{execute, GlobalOpts};

#[derive(Args, Debug)]
pub struct GcArgs {
    /// Run in this process instead of asking the agent.
    #[arg(long)]
    pub local: bool,
}

impl GcArgs {
    pub fn run(self, opts: &GlobalOpts) -> Result<()> {
        execute(opts, Operation::Gc, self.local)?;
        println!("{} mirror compacted", "✓".green().bold());
        Ok(())
    }
}
