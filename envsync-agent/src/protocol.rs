//! Newline-delimited JSON protocol between clients and the agent.
//!
//! ```text
//! → {"cmd":"update","branch":"feature/x","revision":"abc123"}
//! ← {"ok":true,"data":{"status":"Done","from":"unknown","to":"abc123",...}}
//! ```

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use envsync_sync::Operation;

use crate::error::{io_err, AgentError};

pub const CMD_UPDATE_ALL: &str = "update_all";
pub const CMD_UPDATE: &str = "update";
pub const CMD_CLEANUP: &str = "cleanup";
pub const CMD_GIT_GC: &str = "git_gc";
pub const CMD_STATUS: &str = "status";
pub const CMD_STOP: &str = "stop";

/// JSON newline-delimited request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<String>,
}

impl AgentRequest {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            ..Self::default()
        }
    }

    pub fn from_operation(op: &Operation) -> Self {
        match op {
            Operation::UpdateAll => Self::new(CMD_UPDATE_ALL),
            Operation::Update { branch, revision } => Self {
                branch: Some(branch.clone()),
                revision: revision.clone(),
                ..Self::new(CMD_UPDATE)
            },
            Operation::Cleanup { confirm } => Self {
                confirm: confirm.clone(),
                ..Self::new(CMD_CLEANUP)
            },
            Operation::Gc => Self::new(CMD_GIT_GC),
        }
    }

    /// The repository operation this request asks for. `None` for the
    /// control commands `status` and `stop`.
    pub fn to_operation(&self) -> Result<Option<Operation>, AgentError> {
        let op = match self.cmd.as_str() {
            CMD_STATUS | CMD_STOP => return Ok(None),
            CMD_UPDATE_ALL => Operation::UpdateAll,
            CMD_UPDATE => {
                let branch = self.branch.clone().ok_or_else(|| {
                    AgentError::Protocol("'update' requires a branch".to_string())
                })?;
                Operation::Update {
                    branch,
                    revision: self.revision.clone().filter(|rev| !rev.is_empty()),
                }
            }
            CMD_CLEANUP => Operation::Cleanup {
                confirm: self.confirm.clone(),
            },
            CMD_GIT_GC => Operation::Gc,
            other => return Err(AgentError::Protocol(format!("unknown command '{other}'"))),
        };
        Ok(Some(op))
    }
}

/// JSON newline-delimited response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Send one JSON request to the agent socket and return one response.
pub fn send_request(socket: &Path, request: &AgentRequest) -> Result<AgentResponse, AgentError> {
    if !socket.exists() {
        return Err(AgentError::AgentNotRunning {
            socket: socket.to_path_buf(),
        });
    }

    let mut stream = UnixStream::connect(socket).map_err(|err| {
        if matches!(
            err.kind(),
            std::io::ErrorKind::NotFound
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
        ) {
            AgentError::AgentNotRunning {
                socket: socket.to_path_buf(),
            }
        } else {
            io_err(socket, err)
        }
    })?;

    let payload = serde_json::to_string(request)?;
    stream
        .write_all(payload.as_bytes())
        .map_err(|e| io_err(socket, e))?;
    stream.write_all(b"\n").map_err(|e| io_err(socket, e))?;
    stream.flush().map_err(|e| io_err(socket, e))?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| io_err(socket, e))?;
    if read == 0 {
        return Err(AgentError::Protocol(
            "agent closed connection before responding".to_string(),
        ));
    }

    let response: AgentResponse = serde_json::from_str(line.trim_end())?;
    Ok(response)
}

/// Query agent status, retrying briefly while the socket comes up.
pub fn request_status(socket: &Path) -> Result<Value, AgentError> {
    let request = AgentRequest::new(CMD_STATUS);

    let mut last_not_running: Option<AgentError> = None;
    for attempt in 0..5 {
        match send_request(socket, &request) {
            Ok(response) => return response_into_data(response),
            Err(err @ AgentError::AgentNotRunning { .. }) => {
                last_not_running = Some(err);
                if attempt < 4 {
                    sleep(Duration::from_millis(100));
                    continue;
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_not_running.unwrap_or_else(|| {
        AgentError::Protocol("agent status retry loop exited unexpectedly".to_string())
    }))
}

pub fn request_stop(socket: &Path) -> Result<(), AgentError> {
    let response = send_request(socket, &AgentRequest::new(CMD_STOP))?;
    response_into_data(response).map(|_| ())
}

/// Run `op` on the agent and return its report.
pub fn request_operation(socket: &Path, op: &Operation) -> Result<Value, AgentError> {
    let response = send_request(socket, &AgentRequest::from_operation(op))?;
    response_into_data(response)
}

fn response_into_data(response: AgentResponse) -> Result<Value, AgentError> {
    if response.ok {
        Ok(response.data.unwrap_or(Value::Null))
    } else {
        Err(AgentError::Protocol(
            response
                .error
                .unwrap_or_else(|| "unknown agent error".to_string()),
        ))
    }
}
