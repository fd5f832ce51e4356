pub mod agent;
pub mod cleanup;
pub mod gc;
mod output;
pub mod update;

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::Value;

use envsync_agent::{init_tracing_with_default, request_operation, AgentError};
use envsync_core::{config, AgentConfig};
use envsync_sync::{pipeline, Operation};

/// Options shared by every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalOpts {
    pub config: Option<PathBuf>,
    pub verbose: u8,
}

impl GlobalOpts {
    pub fn load_config(&self) -> Result<AgentConfig> {
        config::load(self.config.as_deref()).context("failed to load agent configuration")
    }

    fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

/// Run `op` in-process (`local`) or on the agent, returning the JSON report.
pub fn execute(opts: &GlobalOpts, op: Operation, local: bool) -> Result<Value> {
    let config = opts.load_config()?;
    let name = op.name();

    if local {
        init_tracing_with_default(opts.log_level());
        let report = pipeline::run(&config, op).with_context(|| format!("{name} failed"))?;
        return serde_json::to_value(report).context("failed to encode report");
    }

    match request_operation(&config.socket, &op) {
        Ok(data) => Ok(data),
        Err(err @ AgentError::AgentNotRunning { .. }) => {
            Err(err).context("start it with `envsync agent start` or pass --local")
        }
        Err(err) => Err(err).with_context(|| format!("{name} failed")),
    }
}

/// Print the raw report as pretty JSON.
pub fn print_json(report: &Value) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(report).context("failed to render report JSON")?
    );
    Ok(())
}
