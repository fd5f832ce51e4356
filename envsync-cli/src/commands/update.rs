//! `envsync update`: refresh the mirror and check branches out.

use anyhow::Result;
use clap::Args;

use envsync_sync::Operation;

use super::{execute, output, print_json, GlobalOpts};

/// Arguments for `envsync update`.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Branch to update (omit to update every branch and clean up).
    pub branch: Option<String>,

    /// Commit, tag or ref to pin the branch's environment to.
    #[arg(requires = "branch")]
    pub revision: Option<String>,

    /// Run in this process instead of asking the agent.
    #[arg(long)]
    pub local: bool,

    /// Emit the raw report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl UpdateArgs {
    pub fn run(self, opts: &GlobalOpts) -> Result<()> {
        let op = match self.branch {
            None => Operation::UpdateAll,
            Some(branch) => Operation::Update {
                branch,
                revision: self.revision,
            },
        };
        let all = op == Operation::UpdateAll;

        let report = execute(opts, op, self.local)?;
        if self.json {
            return print_json(&report);
        }
        if all {
            output::print_update_all(&report);
        } else {
            output::print_update(&report);
        }
        Ok(())
    }
}
