//! envsync agent: a Unix-socket request server in front of the sync engine.
//!
//! Requests are queued and processed one at a time; each job additionally
//! takes the host-wide repository lock, so CLI `--local` runs interleave
//! safely with agent jobs.

mod error;
pub mod protocol;
mod runtime;

pub use error::AgentError;
pub use protocol::{
    request_operation, request_status, request_stop, send_request, AgentRequest, AgentResponse,
};
pub use runtime::{init_tracing, init_tracing_with_default, run, start_blocking, JobSummary};
