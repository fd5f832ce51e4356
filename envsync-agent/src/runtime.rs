use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::Instant;

use envsync_core::AgentConfig;
use envsync_sync::pipeline::{self, Operation, OperationReport};

use crate::error::{io_err, AgentError};
use crate::protocol::{AgentRequest, AgentResponse, CMD_STATUS, CMD_STOP};

pub const AGENT_LABEL: &str = "envsync-agent";

/// Set to `json` for machine-readable log lines.
pub const LOG_FORMAT_ENV: &str = "ENVSYNC_LOG_FORMAT";

const JOB_QUEUE_DEPTH: usize = 64;

struct Job {
    op: Operation,
    respond_to: oneshot::Sender<Result<OperationReport, String>>,
}

/// Outcome of the most recent job, reported by `status`.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub cmd: &'static str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at_unix: u64,
    pub duration_ms: u128,
}

#[derive(Debug, Default)]
struct JobStats {
    completed: u64,
    failed: u64,
    last: Option<JobSummary>,
}

type SharedStats = Arc<RwLock<JobStats>>;

/// Start the agent runtime and block the current thread until it exits.
pub fn start_blocking(config: AgentConfig) -> Result<(), AgentError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config))
}

/// Run the agent until `stop` or ctrl-c.
pub async fn run(config: AgentConfig) -> Result<(), AgentError> {
    let config = Arc::new(config);
    let stats: SharedStats = Arc::new(RwLock::new(JobStats::default()));
    let started_at_unix = unix_seconds_now();

    let (job_tx, job_rx) = mpsc::channel::<Job>(JOB_QUEUE_DEPTH);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    tracing::info!(
        socket = %config.socket.display(),
        directory = %config.directory.display(),
        repository = %config.repository,
        "starting agent",
    );

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let config = config.clone();
        let stats = stats.clone();
        tokio::spawn(async move {
            let result = job_processor_task(config, stats, job_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let config = config.clone();
        let stats = stats.clone();
        tokio::spawn(async move {
            let result = socket_server_task(
                config,
                stats,
                job_tx,
                shutdown.clone(),
                shutdown.subscribe(),
                started_at_unix,
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down agent");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(AgentError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (processor_result, socket_result, signal_result) =
        tokio::join!(processor_handle, socket_handle, signal_handle);

    handle_join("job_processor", processor_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("agent stopped");
    Ok(())
}

async fn job_processor_task(
    config: Arc<AgentConfig>,
    stats: SharedStats,
    mut job_rx: mpsc::Receiver<Job>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), AgentError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = job_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let started = Instant::now();
                let cmd = job.op.name();

                let config = config.clone();
                let op = job.op;
                let result = tokio::task::spawn_blocking(move || pipeline::run(&config, op))
                    .await
                    .map_err(|err| AgentError::Protocol(format!("job join error: {err}")))?;

                let outcome = result.map_err(|err| err.to_string());
                let summary = JobSummary {
                    cmd,
                    ok: outcome.is_ok(),
                    error: outcome.as_ref().err().cloned(),
                    finished_at_unix: unix_seconds_now(),
                    duration_ms: started.elapsed().as_millis(),
                };
                match &summary.error {
                    None => tracing::info!(cmd, duration_ms = summary.duration_ms as u64, "job finished"),
                    Some(error) => tracing::error!(cmd, %error, "job failed"),
                }
                record_job(&stats, summary).await;

                let _ = job.respond_to.send(outcome);
            }
        }
    }

    Ok(())
}

async fn record_job(stats: &SharedStats, summary: JobSummary) {
    let mut stats = stats.write().await;
    if summary.ok {
        stats.completed += 1;
    } else {
        stats.failed += 1;
    }
    stats.last = Some(summary);
}

async fn socket_server_task(
    config: Arc<AgentConfig>,
    stats: SharedStats,
    job_tx: mpsc::Sender<Job>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
    started_at_unix: u64,
) -> Result<(), AgentError> {
    let socket = config.socket.clone();
    if let Some(dir) = socket.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
    }
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let config = config.clone();
                let stats = stats.clone();
                let job_tx = job_tx.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(
                        stream,
                        config,
                        stats,
                        job_tx,
                        shutdown_tx,
                        started_at_unix,
                    ).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    config: Arc<AgentConfig>,
    stats: SharedStats,
    job_tx: mpsc::Sender<Job>,
    shutdown_tx: broadcast::Sender<()>,
    started_at_unix: u64,
) -> Result<(), AgentError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("agent socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: AgentRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &AgentResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let response = match request.cmd.as_str() {
            CMD_STATUS => {
                AgentResponse::ok(build_status_payload(&config, &stats, started_at_unix).await)
            }
            CMD_STOP => {
                tracing::info!("stop requested over socket");
                // Reply before signalling; the runtime may be torn down right after.
                write_response(&mut writer, &AgentResponse::ok(json!({ "stopping": true })))
                    .await?;
                let _ = shutdown_tx.send(());
                break;
            }
            _ => dispatch_operation(&request, &job_tx).await,
        };

        write_response(&mut writer, &response).await?;
    }

    Ok(())
}

/// Validate at the boundary, then queue. Every failure becomes `ok: false`.
async fn dispatch_operation(request: &AgentRequest, job_tx: &mpsc::Sender<Job>) -> AgentResponse {
    let op = match request.to_operation() {
        Ok(Some(op)) => op,
        Ok(None) => return AgentResponse::error(format!("'{}' is not a job", request.cmd)),
        Err(err) => return AgentResponse::error(err.to_string()),
    };
    if let Err(err) = op.validate() {
        return AgentResponse::error(err.to_string());
    }
    let report = match enqueue_job(job_tx, op).await {
        Ok(report) => report,
        Err(err) => return AgentResponse::error(err.to_string()),
    };
    match serde_json::to_value(report) {
        Ok(data) => AgentResponse::ok(data),
        Err(err) => AgentResponse::error(format!("failed to encode report: {err}")),
    }
}

async fn enqueue_job(job_tx: &mpsc::Sender<Job>, op: Operation) -> Result<OperationReport, AgentError> {
    let (tx, rx) = oneshot::channel();
    job_tx
        .send(Job { op, respond_to: tx })
        .await
        .map_err(|_| AgentError::ChannelClosed("job queue"))?;

    let outcome = rx
        .await
        .map_err(|_| AgentError::ChannelClosed("job response"))?;
    outcome.map_err(AgentError::Protocol)
}

async fn build_status_payload(config: &AgentConfig, stats: &SharedStats, started_at_unix: u64) -> Value {
    let (completed, failed, last) = {
        let stats = stats.read().await;
        (stats.completed, stats.failed, stats.last.clone())
    };

    json!({
        "running": true,
        "label": AGENT_LABEL,
        "pid": std::process::id(),
        "started_at_unix": started_at_unix,
        "socket": config.socket.display().to_string(),
        "directory": config.directory.display().to_string(),
        "repository": config.repository,
        "mirror": config.mirror_dir().display().to_string(),
        "jobs_completed": completed,
        "jobs_failed": failed,
        "last_job": last,
    })
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), AgentError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(AgentError::Protocol(format!(
                "agent socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale agent socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &AgentResponse,
) -> Result<(), AgentError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("agent socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("agent socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("agent socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), AgentError>, tokio::task::JoinError>,
) -> Result<(), AgentError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(AgentError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

/// Install the global subscriber at `info`. See [`init_tracing_with_default`].
pub fn init_tracing() {
    init_tracing_with_default("info");
}

/// Install the global subscriber, logging to stderr. `RUST_LOG` overrides
/// `default_level`; `ENVSYNC_LOG_FORMAT=json` switches to JSON lines.
/// Records from the `log` facade (the sync engine) are forwarded. Later calls
/// are no-ops.
pub fn init_tracing_with_default(default_level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let _ = if json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init()
    };
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), AgentError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), AgentError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(root: &TempDir) -> AgentConfig {
        AgentConfig::rooted_at(root.path(), "unused")
    }

    #[tokio::test]
    async fn status_payload_reports_idle_agent() {
        let root = TempDir::new().unwrap();
        let config = test_config(&root);
        let stats: SharedStats = Arc::default();

        let payload = build_status_payload(&config, &stats, 42).await;
        assert_eq!(payload["running"], json!(true));
        assert_eq!(payload["started_at_unix"], json!(42));
        assert_eq!(payload["jobs_completed"], json!(0));
        assert_eq!(payload["last_job"], Value::Null);
        assert_eq!(payload["socket"], json!(config.socket.display().to_string()));
    }

    #[tokio::test]
    async fn processor_records_failed_job() {
        let root = TempDir::new().unwrap();
        let config = Arc::new(test_config(&root));
        let stats: SharedStats = Arc::default();
        let (job_tx, job_rx) = mpsc::channel(4);
        let (shutdown_tx, _) = broadcast::channel(1);

        let processor = tokio::spawn(job_processor_task(
            config,
            stats.clone(),
            job_rx,
            shutdown_tx.subscribe(),
        ));

        let err = enqueue_job(&job_tx, Operation::Gc).await.unwrap_err();
        assert!(err.to_string().contains("mirror not found"));

        let _ = shutdown_tx.send(());
        processor.await.expect("join").expect("processor");

        let stats = stats.read().await;
        assert_eq!(stats.failed, 1);
        let last = stats.last.as_ref().expect("last job");
        assert_eq!(last.cmd, "git_gc");
        assert!(!last.ok);
    }

    #[tokio::test]
    async fn invalid_branch_is_rejected_without_queueing() {
        let (job_tx, mut job_rx) = mpsc::channel(4);
        let request = AgentRequest {
            branch: Some("x; reboot".into()),
            ..AgentRequest::new("update")
        };
        let response = dispatch_operation(&request, &job_tx).await;
        assert!(!response.ok);
        assert!(response.error.unwrap_or_default().contains("not shell safe"));
        assert!(job_rx.try_recv().is_err(), "nothing may be queued");
    }

    #[tokio::test]
    async fn unknown_command_is_an_error_response() {
        let (job_tx, _job_rx) = mpsc::channel(4);
        let response = dispatch_operation(&AgentRequest::new("reboot"), &job_tx).await;
        assert!(!response.ok);
        assert!(response.error.unwrap_or_default().contains("unknown command"));
    }

    #[test]
    fn stale_socket_file_is_removed() {
        let root = TempDir::new().unwrap();
        let socket = root.path().join("agent.sock");
        fs::write(&socket, "").unwrap();
        prepare_socket_for_bind(&socket).expect("stale socket removed");
        assert!(!socket.exists());
    }
}
