
use crucible::executor::languages::{LanguageRecipe, LanguageRegistry};
use crucible::executor::Executor;
use crucible::job::JobStatus;
use test_support::bash_job;

fn count_entries(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[tokio::test]
async fn test_completed_job_captures_stdout() {
    let executor = Executor::new();
    let job = bash_job("echo 'Hello, World!'");

    let result = executor.execute(&job).await;

    assert_eq!(result.token, job.token);
    assert_eq!(result.status, JobStatus::Completed);
    assert_eq!(result.stdout, "Hello, World!\n");
    assert_eq!(result.stderr, "");
    assert_eq!(result.exit_code, 0);
    assert!(result.execution_time.unwrap() > 0.0);
}

#[tokio::test]
async fn test_nonzero_exit_is_runtime_error() {
    let executor = Executor::new();
    let job = bash_job("echo oops >&2; exit 3");

    let result = executor.execute(&job).await;

    assert_eq!(result.status, JobStatus::RuntimeError);
    assert_eq!(result.exit_code, 3);
    assert!(result.stderr.contains("oops"));
}

#[tokio::test]
async fn test_wall_clock_breach_is_timeout() {
    let executor = Executor::new();
    let mut job = bash_job("sleep 5");
    job.timeout_ms = Some(1000);

    let result = executor.execute(&job).await;

    assert_eq!(result.status, JobStatus::Timeout);
    assert_eq!(result.exit_code, 124);
    assert_eq!(result.stderr, "Execution timed out");
    // The reported time is the budget, not the measured elapsed.
    assert_eq!(result.execution_time, Some(1000.0));
}

#[tokio::test]
async fn test_sigkilled_child_is_memory_limit_exceeded() {
    // A SIGKILLed child reads as 137, which is what a memory-limit kill
    // looks like from outside.
    let executor = Executor::new();
    let job = bash_job("kill -9 $$");

    let result = executor.execute(&job).await;

    assert_eq!(result.status, JobStatus::MemoryLimitExceeded);
    assert_eq!(result.exit_code, 137);
}

#[tokio::test]
async fn test_unknown_language_creates_no_workspace() {
    let root = tempfile::tempdir().unwrap();
    let executor = Executor::new().with_workspace_root(root.path().to_path_buf());
    let mut job = bash_job("whatever");
    job.language_id = 9999;

    let result = executor.execute(&job).await;

    assert_eq!(result.status, JobStatus::Error);
    assert!(result.stderr.contains("Unsupported language_id: 9999"));
    assert_eq!(result.exit_code, 1);
    assert!(result.execution_time.is_none());
    assert_eq!(count_entries(root.path()), 0);
}

#[tokio::test]
async fn test_workspace_removed_after_execution() {
    let root = tempfile::tempdir().unwrap();
    let executor = Executor::new().with_workspace_root(root.path().to_path_buf());

    let completed = executor.execute(&bash_job("echo done")).await;
    assert_eq!(completed.status, JobStatus::Completed);
    assert_eq!(count_entries(root.path()), 0);

    let failed = executor.execute(&bash_job("exit 1")).await;
    assert_eq!(failed.status, JobStatus::RuntimeError);
    assert_eq!(count_entries(root.path()), 0);
}

fn warning_compiler_registry() -> LanguageRegistry {
    let mut registry = LanguageRegistry::empty();
    registry.insert(
        900,
        LanguageRecipe::Compiled {
            extension: "src",
            compile: |_| "echo 'warning: implicit declaration' >&2".to_string(),
            run: |_| "echo should-not-run".to_string(),
            default_timeout_ms: 2_000,
        },
    );
    registry
}

fn quiet_compiler_registry() -> LanguageRegistry {
    let mut registry = LanguageRegistry::empty();
    registry.insert(
        901,
        LanguageRecipe::Compiled {
            extension: "src",
            compile: |src| format!("test -f {}", src.display()),
            run: |src| format!("cat {}", src.display()),
            default_timeout_ms: 2_000,
        },
    );
    registry
}

#[tokio::test]
async fn test_compile_stderr_fails_even_on_zero_exit() {
    let executor = Executor::with_registry(warning_compiler_registry());
    let mut job = bash_job("source text");
    job.language_id = 900;

    let result = executor.execute(&job).await;

    assert_eq!(result.status, JobStatus::CompilationError);
    assert!(result.stderr.contains("implicit declaration"));
    assert_eq!(result.exit_code, 1);
    assert!(result.execution_time.is_some());
    assert_eq!(result.stdout, "");
}

#[tokio::test]
async fn test_quiet_compile_proceeds_to_execution() {
    let executor = Executor::with_registry(quiet_compiler_registry());
    let mut job = bash_job("the program body");
    job.language_id = 901;

    let result = executor.execute(&job).await;

    assert_eq!(result.status, JobStatus::Completed);
    assert_eq!(result.stdout, "the program body");
}

#[tokio::test]
async fn test_result_token_matches_job_token() {
    let executor = Executor::new();
    let job = bash_job("true");

    let result = executor.execute(&job).await;

    assert_eq!(result.token, job.token);
}
