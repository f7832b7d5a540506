use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal classification of one job. Every accepted job ends in exactly one
/// of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Completed,
    CompilationError,
    RuntimeError,
    Timeout,
    MemoryLimitExceeded,
    Error,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::CompilationError => write!(f, "compilation_error"),
            JobStatus::RuntimeError => write!(f, "runtime_error"),
            JobStatus::Timeout => write!(f, "timeout"),
            JobStatus::MemoryLimitExceeded => write!(f, "memory_limit_exceeded"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

/// One submission as provided by the client. `source_code`, `language_id` and
/// `problem_id` are required; everything else has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInput {
    pub source_code: String,
    pub language_id: u32,
    pub problem_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit_mb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
}

/// The enqueued value: a submission plus the token assigned at submit time.
/// The token is the correlation key for the webhook callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub token: String,
    pub source_code: String,
    pub language_id: u32,
    pub problem_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit_mb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
}

impl Job {
    pub fn from_input(input: JobInput) -> Self {
        Self {
            token: Uuid::new_v4().to_string(),
            source_code: input.source_code,
            language_id: input.language_id,
            problem_id: input.problem_id,
            callback_url: input.callback_url,
            timeout_ms: input.timeout_ms,
            memory_limit_mb: input.memory_limit_mb,
            expected_output: input.expected_output,
        }
    }
}

/// Result descriptor delivered to the callback URL. `execution_time` is the
/// wall-clock duration in milliseconds of whichever phase decided the status
/// (compile for compilation errors, execute otherwise), absent when no phase
/// ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub token: String,
    pub status: JobStatus,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(rename = "execution_time", skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    pub exit_code: i32,
}

impl JobResult {
    /// Result for a job that failed before any phase could start, e.g. an
    /// unknown language id or a workspace setup failure.
    pub fn internal_error(token: &str, stderr: String) -> Self {
        Self {
            token: token.to_string(),
            status: JobStatus::Error,
            stdout: String::new(),
            stderr,
            execution_time: None,
            exit_code: 1,
        }
    }
}
