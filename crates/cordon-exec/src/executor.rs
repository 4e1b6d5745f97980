//! Sandboxed process executor.
//!
//! Each invocation materializes a driver script to a uniquely named temp
//! file, spawns it through `sh` under a scrubbed environment, and walks a
//! small state machine: Starting → Running → (Completed | TimedOut →
//! Terminating → Terminated | SpawnFailed). Exactly one terminal value is
//! returned per invocation; the temp file is removed on every exit path.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use chrono::Utc;
use cordon_core::config::schema::SAFE_ENV_VARS;
use cordon_core::config::ExecConfig;
use cordon_core::observability;
use cordon_core::protocol::{ExecDiagnostics, ExecErrorInfo, ExecFailure, ExecOutcome};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::wrapper::compose_driver;

/// How much of each output tail a progress event carries.
const PROGRESS_TAIL_BYTES: usize = 500;
/// Grace between SIGTERM and SIGKILL for long operations.
const TERM_GRACE: Duration = Duration::from_secs(5);

/// One execution request, already validated by the command policy.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub command: String,
    pub timeout: Option<Duration>,
    pub long_operation: bool,
    pub stream_output: bool,
    pub settle_secs: Option<u64>,
}

/// Incremental events pushed to the response channel in streaming mode.
#[derive(Debug, Clone)]
pub enum ExecEvent {
    Stdout {
        data: String,
        timestamp: String,
    },
    Stderr {
        data: String,
        timestamp: String,
    },
    Progress {
        elapsed_ms: u64,
        ms_since_output: u64,
        stdout_tail: String,
        stderr_tail: String,
    },
}

/// Invocation phases. `Completed`, `Terminated` and `SpawnFailed` are
/// terminal; the single return value is the latch that prevents duplicate
/// terminal emissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecPhase {
    Starting,
    Running,
    TimedOut,
    Terminating,
}

#[derive(Clone, Copy)]
enum ChunkKind {
    Stdout,
    Stderr,
}

pub struct Executor {
    workspace: PathBuf,
    cfg: ExecConfig,
    script_dir: PathBuf,
}

impl Executor {
    pub fn new(workspace: PathBuf, cfg: ExecConfig) -> Self {
        Self {
            workspace,
            cfg,
            script_dir: std::env::temp_dir(),
        }
    }

    /// Place driver scripts in `dir` instead of the system temp directory.
    pub fn with_script_dir(mut self, dir: PathBuf) -> Self {
        self.script_dir = dir;
        self
    }

    fn effective_timeout(&self, req: &ExecRequest) -> Duration {
        req.timeout.unwrap_or_else(|| {
            if req.long_operation {
                Duration::from_secs(self.cfg.long_timeout_secs)
            } else {
                Duration::from_secs(self.cfg.timeout_secs)
            }
        })
    }

    /// Children inherit only the named safe variables plus everything under
    /// the configured agent prefix.
    fn build_child_env(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        for name in SAFE_ENV_VARS {
            if let Ok(v) = std::env::var(name) {
                env.insert(name.to_string(), v);
            }
        }
        for name in &self.cfg.extra_safe_env {
            if let Ok(v) = std::env::var(name) {
                env.insert(name.clone(), v);
            }
        }
        for (k, v) in std::env::vars() {
            if k.starts_with(&self.cfg.agent_env_prefix) {
                env.insert(k, v);
            }
        }
        env.insert(
            "PWD".to_string(),
            self.workspace.to_string_lossy().to_string(),
        );
        env
    }

    fn spawn_diagnostics(&self, command: &str, err: &std::io::Error) -> ExecDiagnostics {
        let enoent = err.kind() == std::io::ErrorKind::NotFound;
        let mut install_hints = Vec::new();
        if enoent {
            for (tool, hint) in [
                ("npm", "npm is missing: install Node.js from https://nodejs.org"),
                ("yarn", "yarn is missing: run `corepack enable yarn`"),
                ("pnpm", "pnpm is missing: run `corepack enable pnpm`"),
            ] {
                if which::which(tool).is_err() {
                    install_hints.push(hint.to_string());
                }
            }
        }
        ExecDiagnostics {
            command: command.to_string(),
            working_dir: self.workspace.to_string_lossy().to_string(),
            path_env: std::env::var("PATH").unwrap_or_default(),
            runtime_version: env!("CARGO_PKG_VERSION").to_string(),
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            likely_cause: enoent.then(|| {
                "the executable was not found on the scrubbed PATH".to_string()
            }),
            install_hints,
        }
    }

    /// Run one request. In streaming mode incremental events go through
    /// `events`; the returned value is the single terminal result either way.
    pub async fn run(
        &self,
        req: &ExecRequest,
        events: Option<mpsc::Sender<ExecEvent>>,
    ) -> Result<ExecOutcome, ExecFailure> {
        let execution_id = Uuid::new_v4().to_string();
        let mut phase = ExecPhase::Starting;
        let started = Instant::now();
        let start_time = Utc::now();

        let settle = req.settle_secs.unwrap_or(self.cfg.settle_secs);
        let script = compose_driver(&req.command, settle);
        tracing::debug!(execution = %execution_id, phase = ?phase, settle, "driver composed");

        // Unique temp file; the handle's drop removes it on every exit path.
        let mut script_file = match tempfile::Builder::new()
            .prefix("cordon-exec-")
            .suffix(".sh")
            .tempfile_in(&self.script_dir)
        {
            Ok(f) => f,
            Err(e) => {
                return Err(self.failure_from_io(req, &e, started, String::new(), String::new()))
            }
        };
        if let Err(e) = script_file.write_all(script.as_bytes()) {
            return Err(self.failure_from_io(req, &e, started, String::new(), String::new()));
        }

        observability::audit_command_invoked(&execution_id, &req.command, req.long_operation);
        tracing::info!(
            execution = %execution_id,
            long_operation = req.long_operation,
            "▶ {}",
            req.command
        );

        let mut child = match Command::new("sh")
            .arg(script_file.path())
            .current_dir(&self.workspace)
            .env_clear()
            .envs(self.build_child_env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                observability::audit_command_completed(&execution_id, "spawn_failed", None, 0);
                return Err(ExecFailure {
                    error: ExecErrorInfo {
                        message: format!("failed to spawn command: {}", e),
                        error_type: "SpawnError".to_string(),
                        code: (e.kind() == std::io::ErrorKind::NotFound)
                            .then(|| "ENOENT".to_string()),
                    },
                    stdout: String::new(),
                    stderr: String::new(),
                    diagnostics: Some(self.spawn_diagnostics(&req.command, &e)),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });
            }
        };
        phase = ExecPhase::Running;

        let (chunk_tx, mut chunk_rx) = mpsc::channel::<(ChunkKind, Vec<u8>)>(64);
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, ChunkKind::Stdout, chunk_tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, ChunkKind::Stderr, chunk_tx);
        }

        let timeout = self.effective_timeout(req);
        let timeout_sleep = tokio::time::sleep(timeout);
        tokio::pin!(timeout_sleep);

        let keepalive_period = Duration::from_secs(self.cfg.keepalive_secs.max(1));
        let mut keepalive = tokio::time::interval_at(
            tokio::time::Instant::now() + keepalive_period,
            keepalive_period,
        );

        let mut stdout_buf: Vec<u8> = Vec::new();
        let mut stderr_buf: Vec<u8> = Vec::new();
        let mut chunk_count = 0usize;
        let mut last_output = Instant::now();
        let mut finished_code: Option<i32> = None;
        let mut timed_out = false;

        while !timed_out && finished_code.is_none() {
            tokio::select! {
                _ = &mut timeout_sleep => {
                    phase = ExecPhase::TimedOut;
                    tracing::warn!(execution = %execution_id, "⏱ timeout after {:?}, terminating", timeout);
                    terminate(&mut child, req.long_operation, &mut phase).await;
                    timed_out = true;
                }
                maybe = chunk_rx.recv() => {
                    match maybe {
                        Some((kind, bytes)) => {
                            chunk_count += 1;
                            last_output = Instant::now();
                            let data = String::from_utf8_lossy(&bytes).into_owned();
                            match kind {
                                ChunkKind::Stdout => stdout_buf.extend_from_slice(&bytes),
                                ChunkKind::Stderr => stderr_buf.extend_from_slice(&bytes),
                            }
                            if req.stream_output {
                                if let Some(tx) = &events {
                                    let event = match kind {
                                        ChunkKind::Stdout => ExecEvent::Stdout {
                                            data,
                                            timestamp: Utc::now().to_rfc3339(),
                                        },
                                        ChunkKind::Stderr => ExecEvent::Stderr {
                                            data,
                                            timestamp: Utc::now().to_rfc3339(),
                                        },
                                    };
                                    let _ = tx.send(event).await;
                                }
                            }
                        }
                        None => {
                            // Both pipes closed; collect the exit status.
                            finished_code = Some(
                                child
                                    .wait()
                                    .await
                                    .map(|s| s.code().unwrap_or(-1))
                                    .unwrap_or(-1),
                            );
                        }
                    }
                }
                _ = keepalive.tick(), if req.long_operation => {
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    let ms_since_output = last_output.elapsed().as_millis() as u64;
                    tracing::info!(
                        execution = %execution_id,
                        elapsed_ms,
                        ms_since_output,
                        "⏳ still running"
                    );
                    if req.stream_output {
                        if let Some(tx) = &events {
                            let _ = tx.send(ExecEvent::Progress {
                                elapsed_ms,
                                ms_since_output,
                                stdout_tail: tail_lossy(&stdout_buf),
                                stderr_tail: tail_lossy(&stderr_buf),
                            }).await;
                        }
                    }
                }
            }
        }

        // Drain whatever the readers produced before the pipes closed.
        while let Ok((kind, bytes)) = chunk_rx.try_recv() {
            match kind {
                ChunkKind::Stdout => stdout_buf.extend_from_slice(&bytes),
                ChunkKind::Stderr => stderr_buf.extend_from_slice(&bytes),
            }
        }

        // Explicit cleanup even though drop would cover it.
        let _ = script_file.flush();
        drop(script_file);

        let end_time = Utc::now();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let stdout = String::from_utf8_lossy(&stdout_buf).into_owned();
        let stderr = String::from_utf8_lossy(&stderr_buf).into_owned();

        if timed_out {
            observability::audit_command_completed(&execution_id, "timeout", None, elapsed_ms);
            return Err(ExecFailure {
                error: ExecErrorInfo {
                    message: format!(
                        "command timed out after {} ms and was terminated",
                        timeout.as_millis()
                    ),
                    error_type: "Timeout".to_string(),
                    code: None,
                },
                stdout,
                stderr,
                diagnostics: None,
                elapsed_ms,
            });
        }

        let exit_code = finished_code.expect("loop exits with a code or a timeout");
        debug_assert_eq!(phase, ExecPhase::Running);
        observability::audit_command_completed(
            &execution_id,
            "completed",
            Some(exit_code),
            elapsed_ms,
        );
        tracing::info!(execution = %execution_id, exit_code, elapsed_ms, "■ done");

        Ok(ExecOutcome {
            stdout,
            stderr,
            exit_code,
            start_time: start_time.to_rfc3339(),
            end_time: end_time.to_rfc3339(),
            elapsed_ms,
            output_chunks: req.stream_output.then_some(chunk_count),
            long_operation: req.long_operation,
        })
    }

    fn failure_from_io(
        &self,
        req: &ExecRequest,
        err: &std::io::Error,
        started: Instant,
        stdout: String,
        stderr: String,
    ) -> ExecFailure {
        ExecFailure {
            error: ExecErrorInfo {
                message: format!("driver setup failed: {}", err),
                error_type: "SpawnError".to_string(),
                code: None,
            },
            stdout,
            stderr,
            diagnostics: Some(self.spawn_diagnostics(&req.command, err)),
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}

fn spawn_reader(
    mut reader: impl tokio::io::AsyncRead + Unpin + Send + 'static,
    kind: ChunkKind,
    tx: mpsc::Sender<(ChunkKind, Vec<u8>)>,
) {
    tokio::spawn(async move {
        let mut buf = [0u8; 8192];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send((kind, buf[..n].to_vec())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
}

/// SIGTERM first; long operations get a grace window and then SIGKILL.
async fn terminate(child: &mut tokio::process::Child, long_operation: bool, phase: &mut ExecPhase) {
    *phase = ExecPhase::Terminating;
    send_sigterm(child);
    if long_operation {
        tokio::time::sleep(TERM_GRACE).await;
        let _ = child.start_kill();
    }
    // Bounded wait; kill_on_drop covers a child that ignores SIGTERM.
    let _ = tokio::time::timeout(Duration::from_secs(1), child.wait()).await;
}

#[cfg(unix)]
fn send_sigterm(child: &tokio::process::Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    if let Some(pid) = child.id() {
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }
}

#[cfg(not(unix))]
fn send_sigterm(_child: &tokio::process::Child) {}

fn tail_lossy(buf: &[u8]) -> String {
    let start = buf.len().saturating_sub(PROGRESS_TAIL_BYTES);
    String::from_utf8_lossy(&buf[start..]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exec_cfg() -> ExecConfig {
        ExecConfig {
            timeout_secs: 30,
            long_timeout_secs: 300,
            keepalive_secs: 10,
            settle_secs: 0,
            agent_env_prefix: "CORDON_".to_string(),
            extra_safe_env: vec![],
        }
    }

    fn request(command: &str) -> ExecRequest {
        ExecRequest {
            command: command.to_string(),
            timeout: None,
            long_operation: false,
            stream_output: false,
            settle_secs: Some(0),
        }
    }

    // ---- happy path ----

    #[tokio::test]
    async fn test_simple_command() {
        let tmp = TempDir::new().unwrap();
        let ex = Executor::new(tmp.path().to_path_buf(), exec_cfg());
        let out = ex.run(&request("echo hello"), None).await.unwrap();
        assert_eq!(out.exit_code, 0);
        assert!(out.stdout.contains("hello"));
        assert!(out.output_chunks.is_none());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_success_with_code() {
        let tmp = TempDir::new().unwrap();
        let ex = Executor::new(tmp.path().to_path_buf(), exec_cfg());
        let out = ex.run(&request("sh -c 'exit 3'"), None).await.unwrap();
        assert_eq!(out.exit_code, 3);
    }

    // ---- environment scrubbing ----

    #[tokio::test]
    async fn test_env_scrubbed_to_allowlist_and_prefix() {
        std::env::set_var("CORDON_TEST_MARKER", "visible");
        std::env::set_var("UNSAFE_TEST_MARKER", "invisible");
        let tmp = TempDir::new().unwrap();
        let ex = Executor::new(tmp.path().to_path_buf(), exec_cfg());
        let out = ex.run(&request("env"), None).await.unwrap();
        assert!(out.stdout.contains("CORDON_TEST_MARKER=visible"));
        assert!(!out.stdout.contains("UNSAFE_TEST_MARKER"));
        std::env::remove_var("CORDON_TEST_MARKER");
        std::env::remove_var("UNSAFE_TEST_MARKER");
    }

    // ---- timeout ----

    #[tokio::test]
    async fn test_timeout_terminates() {
        let tmp = TempDir::new().unwrap();
        let ex = Executor::new(tmp.path().to_path_buf(), exec_cfg());
        let mut req = request("sleep 30");
        req.timeout = Some(Duration::from_millis(200));
        let err = ex.run(&req, None).await.unwrap_err();
        assert_eq!(err.error.error_type, "Timeout");
        assert!(err.elapsed_ms >= 200);
    }

    // ---- driver cleanup ----

    #[tokio::test]
    async fn test_driver_removed_after_run() {
        let tmp = TempDir::new().unwrap();
        let scripts = TempDir::new().unwrap();
        let ex = Executor::new(tmp.path().to_path_buf(), exec_cfg())
            .with_script_dir(scripts.path().to_path_buf());
        ex.run(&request("echo done"), None).await.unwrap();
        let leftovers = std::fs::read_dir(scripts.path()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_driver_removed_after_timeout() {
        let tmp = TempDir::new().unwrap();
        let scripts = TempDir::new().unwrap();
        let ex = Executor::new(tmp.path().to_path_buf(), exec_cfg())
            .with_script_dir(scripts.path().to_path_buf());
        let mut req = request("sleep 30");
        req.timeout = Some(Duration::from_millis(100));
        let _ = ex.run(&req, None).await;
        assert_eq!(std::fs::read_dir(scripts.path()).unwrap().count(), 0);
    }

    // ---- streaming ----

    #[tokio::test]
    async fn test_streaming_forwards_chunks() {
        let tmp = TempDir::new().unwrap();
        let ex = Executor::new(tmp.path().to_path_buf(), exec_cfg());
        let (tx, mut rx) = mpsc::channel(16);
        let mut req = request("printf 'a\\nb\\n'");
        req.stream_output = true;
        let out = ex.run(&req, Some(tx)).await.unwrap();
        assert_eq!(out.exit_code, 0);
        assert!(out.output_chunks.unwrap_or(0) >= 1);

        let mut saw_stdout = false;
        while let Ok(ev) = rx.try_recv() {
            if matches!(ev, ExecEvent::Stdout { .. }) {
                saw_stdout = true;
            }
        }
        assert!(saw_stdout);
    }

    // ---- spawn diagnostics ----

    #[tokio::test]
    async fn test_missing_tool_reports_exit_127() {
        let tmp = TempDir::new().unwrap();
        let ex = Executor::new(tmp.path().to_path_buf(), exec_cfg());
        let out = ex
            .run(&request("definitely-not-a-real-tool-xyz"), None)
            .await
            .unwrap();
        assert_eq!(out.exit_code, 127);
    }
}
