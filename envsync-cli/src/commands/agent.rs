//! `envsync agent`: background agent lifecycle.

use anyhow::{Context, Result};
use clap::Subcommand;

use envsync_agent::{request_status, request_stop, start_blocking, AgentError};

use super::{print_json, GlobalOpts};

#[derive(Subcommand, Debug)]
pub enum AgentCommand {
    /// Run the agent in the foreground.
    Start,
    /// Request graceful agent shutdown over the socket.
    Stop,
    /// Query agent runtime status over the socket.
    Status,
}

pub fn run(command: AgentCommand, opts: &GlobalOpts) -> Result<()> {
    let config = opts.load_config()?;

    match command {
        AgentCommand::Start => {
            start_blocking(config).context("agent exited with error")?;
        }
        AgentCommand::Stop => match request_stop(&config.socket) {
            Ok(()) => println!("agent stop requested"),
            Err(AgentError::AgentNotRunning { .. }) => {
                println!("agent is not running");
            }
            Err(err) => return Err(err).context("failed to stop agent"),
        },
        AgentCommand::Status => match request_status(&config.socket) {
            Ok(status) => print_json(&status)?,
            Err(AgentError::AgentNotRunning { .. }) => {
                print_json(&serde_json::json!({
                    "running": false,
                    "socket": config.socket.display().to_string(),
                }))?;
            }
            Err(err) => return Err(err).context("failed to query agent status"),
        },
    }

    Ok(())
}
