//! Job lifecycle runner
//!
//! Drives one job through the status state machine: creates the output
//! directory on entry to IN_PROGRESS, retries the body up to the configured
//! attempt budget, verifies the result-shape contract on success, and cleans
//! up the output directory on failure when configured to. Cleanup problems
//! are captured on the outcome, never raised over the primary failure.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    delete_output_dir, CancelToken, FailureKind, Job, JobError, JobFailure, JobResult, JobStatus,
};

/// Terminal record of one job execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    /// Job kind name.
    pub job: String,
    /// Terminal status.
    pub status: JobStatus,
    /// Body executions performed (0 when revoked before the first attempt).
    pub attempts: usize,
    /// Result payload; present only on SUCCESS.
    pub result: Option<JobResult>,
    /// Captured failure; present on FAILURE and REVOKED.
    pub error: Option<JobFailure>,
    /// Output-directory cleanup problem, if one occurred.
    pub cleanup_error: Option<String>,
    /// When the runner picked the job up.
    pub started_at: DateTime<Utc>,
    /// When the job reached its terminal status.
    pub finished_at: DateTime<Utc>,
}

impl JobOutcome {
    /// True if the job reached SUCCESS.
    pub fn succeeded(&self) -> bool {
        self.status == JobStatus::Success
    }
}

/// Executes jobs with retry, cancellation, and output-directory ownership.
#[derive(Debug, Clone)]
pub struct JobRunner {
    max_attempts: usize,
    save_job_output: bool,
}

impl Default for JobRunner {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            save_job_output: true,
        }
    }
}

impl JobRunner {
    /// Runner with the given attempt budget (clamped to at least one).
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            save_job_output: true,
        }
    }

    /// Whether failed jobs keep their output directory.
    pub fn with_save_output(mut self, save: bool) -> Self {
        self.save_job_output = save;
        self
    }

    /// Run one job to a terminal status.
    ///
    /// `output_dir` becomes the job's exclusively owned directory for the
    /// duration of the run; it is created idempotently before the body and
    /// removed (best-effort) on FAILURE/REVOKED unless output saving is on.
    pub fn run(&self, job: &mut dyn Job, output_dir: &Path, cancel: &CancelToken) -> JobOutcome {
        let started_at = Utc::now();
        let mut outcome = JobOutcome {
            job: job.name().to_string(),
            status: JobStatus::NotStarted,
            attempts: 0,
            result: None,
            error: None,
            cleanup_error: None,
            started_at,
            finished_at: started_at,
        };

        if cancel.is_revoked() {
            outcome.status = JobStatus::Revoked;
            outcome.error = Some(JobFailure::new(
                FailureKind::JobExecution,
                &"revoked before start",
            ));
            outcome.finished_at = Utc::now();
            return outcome;
        }

        if let Err(e) = std::fs::create_dir_all(output_dir) {
            // No primary error yet, so the directory problem is the failure.
            outcome.status = JobStatus::Failure;
            outcome.error = Some(JobFailure::new(FailureKind::Cleanup, &e));
            outcome.finished_at = Utc::now();
            return outcome;
        }
        outcome.status = JobStatus::InProgress;

        let ctx = super::JobContext::new(output_dir, cancel.clone());
        let mut last_error: Option<JobError> = None;

        for _ in 0..self.max_attempts {
            if cancel.is_revoked() {
                break;
            }
            outcome.attempts += 1;
            match job.run(&ctx) {
                Ok(result) => match check_result_shape(job, result) {
                    Ok(result) => {
                        outcome.status = JobStatus::Success;
                        outcome.result = Some(result);
                        outcome.finished_at = Utc::now();
                        return outcome;
                    }
                    Err(e) => {
                        // A malformed payload is a contract bug; retrying
                        // the body will not change its shape.
                        last_error = Some(e);
                        break;
                    }
                },
                Err(e) => last_error = Some(e),
            }
        }

        if cancel.is_revoked() {
            outcome.status = JobStatus::Revoked;
            outcome.error = Some(JobFailure::new(
                FailureKind::JobExecution,
                &"revoked while in progress",
            ));
        } else {
            outcome.status = JobStatus::Failure;
            let error = last_error.unwrap_or(JobError::Failed("job produced no result".into()));
            outcome.error = Some(JobFailure::new(FailureKind::JobExecution, &error));
        }

        if !self.save_job_output {
            if let Err(e) = delete_output_dir(output_dir) {
                outcome.cleanup_error = Some(e.to_string());
            }
        }

        outcome.finished_at = Utc::now();
        outcome
    }
}

fn check_result_shape(job: &dyn Job, result: JobResult) -> Result<JobResult, JobError> {
    for key in job.required_keys() {
        if !result.contains(key) {
            return Err(JobError::MissingResultKey {
                job: job.name().to_string(),
                key: (*key).to_string(),
            });
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobContext;

    /// Body that fails a fixed number of times before succeeding.
    struct FlakyJob {
        failures_left: usize,
        promised: &'static [&'static str],
        emit: fn() -> JobResult,
    }

    impl FlakyJob {
        fn failing(n: usize) -> Self {
            Self {
                failures_left: n,
                promised: &["value"],
                emit: || JobResult::new().with_entry("value", 1),
            }
        }

        fn malformed() -> Self {
            Self {
                failures_left: 0,
                promised: &["model_path"],
                emit: JobResult::new,
            }
        }
    }

    impl Job for FlakyJob {
        fn name(&self) -> &str {
            "flaky"
        }

        fn required_keys(&self) -> &'static [&'static str] {
            self.promised
        }

        fn run(&mut self, _ctx: &JobContext) -> Result<JobResult, JobError> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(JobError::Failed("transient".into()));
            }
            Ok((self.emit)())
        }
    }

    fn run_in_tempdir(runner: &JobRunner, job: &mut dyn Job, cancel: &CancelToken) -> JobOutcome {
        let dir = tempfile::tempdir().unwrap();
        runner.run(job, &dir.path().join("out"), cancel)
    }

    #[test]
    fn test_success_first_attempt() {
        let runner = JobRunner::new(1);
        let mut job = FlakyJob::failing(0);
        let outcome = run_in_tempdir(&runner, &mut job, &CancelToken::new());
        assert_eq!(outcome.status, JobStatus::Success);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.result.is_some());
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_retry_until_success() {
        let runner = JobRunner::new(3);
        let mut job = FlakyJob::failing(2);
        let outcome = run_in_tempdir(&runner, &mut job, &CancelToken::new());
        assert_eq!(outcome.status, JobStatus::Success);
        assert_eq!(outcome.attempts, 3);
    }

    #[test]
    fn test_attempt_budget_exhausted_is_failure() {
        let runner = JobRunner::new(2);
        let mut job = FlakyJob::failing(5);
        let outcome = run_in_tempdir(&runner, &mut job, &CancelToken::new());
        assert_eq!(outcome.status, JobStatus::Failure);
        assert_eq!(outcome.attempts, 2);
        let failure = outcome.error.unwrap();
        assert_eq!(failure.kind, FailureKind::JobExecution);
        assert!(failure.message.contains("transient"));
    }

    #[test]
    fn test_malformed_result_is_failure_without_retry() {
        let runner = JobRunner::new(3);
        let mut job = FlakyJob::malformed();
        let outcome = run_in_tempdir(&runner, &mut job, &CancelToken::new());
        assert_eq!(outcome.status, JobStatus::Failure);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.error.unwrap().message.contains("model_path"));
    }

    #[test]
    fn test_revoked_before_start() {
        let runner = JobRunner::new(1);
        let cancel = CancelToken::new();
        cancel.revoke();
        let mut job = FlakyJob::failing(0);
        let outcome = run_in_tempdir(&runner, &mut job, &cancel);
        assert_eq!(outcome.status, JobStatus::Revoked);
        assert_eq!(outcome.attempts, 0);
    }

    #[test]
    fn test_output_dir_created_before_body() {
        struct DirCheckJob;
        impl Job for DirCheckJob {
            fn name(&self) -> &str {
                "dir_check"
            }
            fn required_keys(&self) -> &'static [&'static str] {
                &["existed"]
            }
            fn run(&mut self, ctx: &JobContext) -> Result<JobResult, JobError> {
                Ok(JobResult::new().with_entry("existed", ctx.output_dir.is_dir()))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a").join("b");
        let outcome = JobRunner::new(1).run(&mut DirCheckJob, &out, &CancelToken::new());
        assert_eq!(
            outcome.result.unwrap().get("existed"),
            Some(&serde_json::json!(true))
        );
    }

    #[test]
    fn test_failed_job_output_removed_unless_saving() {
        struct FailJob;
        impl Job for FailJob {
            fn name(&self) -> &str {
                "fail"
            }
            fn required_keys(&self) -> &'static [&'static str] {
                &[]
            }
            fn run(&mut self, ctx: &JobContext) -> Result<JobResult, JobError> {
                std::fs::write(ctx.output_path("partial.bin"), b"junk")?;
                Err(JobError::Failed("boom".into()))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");

        let outcome = JobRunner::new(1)
            .with_save_output(false)
            .run(&mut FailJob, &out, &CancelToken::new());
        assert_eq!(outcome.status, JobStatus::Failure);
        assert!(outcome.cleanup_error.is_none());
        assert!(!out.exists());

        let outcome = JobRunner::new(1)
            .with_save_output(true)
            .run(&mut FailJob, &out, &CancelToken::new());
        assert_eq!(outcome.status, JobStatus::Failure);
        assert!(out.join("partial.bin").exists());
    }
}
