//! Turns one job into one result.
//!
//! The executor owns a private temp workspace per job, writes the submitted
//! source to `Main.<ext>`, optionally compiles it, then runs it under a
//! wall-clock and address-space budget and classifies the exit:
//!
//! 1. Unknown language id: `error`, no workspace is created.
//! 2. Compile phase (compiled recipes only, fixed 30 s cap): any stderr
//!    output fails the job as `compilation_error`. Compilers that exit zero
//!    while warning on stderr are surfaced rather than silently executed.
//! 3. Execute phase: one `sh -c` invocation applying `ulimit -v` and
//!    `timeout`, so a breach kills the child with a distinguishable code.
//! 4. Classify: 124 wall-clock kill, 137 memory kill, other non-zero runtime
//!    error, zero completed.
//! 5. Cleanup: the workspace is removed on every path; removal failure is
//!    logged and never alters the result.
//!
//! The executor never returns an error: every failure mode is encoded in the
//! [`JobResult`].

pub mod languages;

use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use tokio::process::Command;

use crate::job::{Job, JobResult, JobStatus};
use languages::{LanguageRecipe, LanguageRegistry};

/// Fixed cap for the compile phase.
const COMPILE_CAP_SECS: u64 = 30;
/// Address-space cap applied when the job does not set one.
const DEFAULT_MEMORY_LIMIT_MB: u64 = 512;
/// Exit code `timeout(1)` reports on a wall-clock kill.
const TIMEOUT_EXIT_CODE: i32 = 124;
/// Exit code of a SIGKILLed child, which is what a memory-limit kill looks like.
const OOM_EXIT_CODE: i32 = 137;

pub struct Executor {
    registry: LanguageRegistry,
    workspace_root: Option<PathBuf>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Self::with_registry(LanguageRegistry::builtin())
    }

    pub fn with_registry(registry: LanguageRegistry) -> Self {
        Self {
            registry,
            workspace_root: None,
        }
    }

    /// Root directory for job workspaces instead of the system temp dir.
    pub fn with_workspace_root(mut self, root: PathBuf) -> Self {
        self.workspace_root = Some(root);
        self
    }

    /// Execute one job to a terminal result. Infallible by contract: internal
    /// failures come back as `status: error`.
    pub async fn execute(&self, job: &Job) -> JobResult {
        let Some(recipe) = self.registry.get(job.language_id) else {
            return JobResult::internal_error(
                &job.token,
                format!("Unsupported language_id: {}", job.language_id),
            );
        };

        let mut builder = tempfile::Builder::new();
        builder.prefix("crucible-job-");
        let workspace = match &self.workspace_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        let workspace = match workspace {
            Ok(dir) => dir,
            Err(e) => {
                tracing::error!(token = %job.token, error = %e, "Failed to create job workspace");
                return JobResult::internal_error(
                    &job.token,
                    format!("Failed to create workspace: {e}"),
                );
            }
        };

        let result = self.run_phases(job, recipe, workspace.path()).await;

        if let Err(e) = workspace.close() {
            tracing::warn!(token = %job.token, error = %e, "Failed to remove job workspace");
        }

        result
    }

    async fn run_phases(&self, job: &Job, recipe: &LanguageRecipe, dir: &Path) -> JobResult {
        let source_path = dir.join(format!("Main.{}", recipe.extension()));
        if let Err(e) = tokio::fs::write(&source_path, &job.source_code).await {
            tracing::error!(token = %job.token, error = %e, "Failed to write source file");
            return JobResult::internal_error(&job.token, format!("Failed to write source: {e}"));
        }

        if let Some(compile_cmd) = recipe.compile_command(&source_path) {
            let started = Instant::now();
            let output = match run_shell(&format!("timeout {COMPILE_CAP_SECS} {compile_cmd}"), dir)
                .await
            {
                Ok(output) => output,
                Err(e) => {
                    tracing::error!(token = %job.token, error = %e, "Compile command failed to start");
                    return JobResult::internal_error(&job.token, format!("Compile failed: {e}"));
                }
            };
            let compile_ms = round_ms(started.elapsed());

            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            if !stderr.is_empty() {
                tracing::debug!(token = %job.token, compile_ms, "Compilation failed");
                return JobResult {
                    token: job.token.clone(),
                    status: JobStatus::CompilationError,
                    stdout: String::new(),
                    stderr,
                    execution_time: Some(compile_ms),
                    exit_code: 1,
                };
            }
        }

        let timeout_ms = job.timeout_ms.unwrap_or_else(|| recipe.default_timeout_ms());
        let memory_limit_mb = job.memory_limit_mb.unwrap_or(DEFAULT_MEMORY_LIMIT_MB);
        let timeout_secs = timeout_ms.div_ceil(1000);
        let memory_limit_kb = memory_limit_mb * 1024;

        let run_cmd = recipe.run_command(&source_path);
        let bounded = format!("ulimit -v {memory_limit_kb} && timeout {timeout_secs} {run_cmd}");

        let started = Instant::now();
        let output = match run_shell(&bounded, dir).await {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(token = %job.token, error = %e, "Execute command failed to start");
                return JobResult::internal_error(&job.token, format!("Execution failed: {e}"));
            }
        };
        let execution_ms = round_ms(started.elapsed());

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = exit_code(&output.status);

        match exit_code {
            TIMEOUT_EXIT_CODE => JobResult {
                token: job.token.clone(),
                status: JobStatus::Timeout,
                stdout,
                stderr: "Execution timed out".to_string(),
                execution_time: Some(timeout_ms as f64),
                exit_code: TIMEOUT_EXIT_CODE,
            },
            OOM_EXIT_CODE => JobResult {
                token: job.token.clone(),
                status: JobStatus::MemoryLimitExceeded,
                stdout,
                stderr,
                execution_time: Some(execution_ms),
                exit_code: OOM_EXIT_CODE,
            },
            0 => JobResult {
                token: job.token.clone(),
                status: JobStatus::Completed,
                stdout,
                stderr,
                execution_time: Some(execution_ms),
                exit_code: 0,
            },
            code => JobResult {
                token: job.token.clone(),
                status: JobStatus::RuntimeError,
                stdout,
                stderr,
                execution_time: Some(execution_ms),
                exit_code: code,
            },
        }
    }
}

async fn run_shell(command: &str, dir: &Path) -> std::io::Result<std::process::Output> {
    Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
}

/// Signaled children have no exit code; map them to the conventional
/// 128 + signal so a SIGKILL reads as 137.
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(1))
}

/// Milliseconds, rounded to two decimals.
fn round_ms(elapsed: std::time::Duration) -> f64 {
    (elapsed.as_secs_f64() * 100_000.0).round() / 100.0
}
