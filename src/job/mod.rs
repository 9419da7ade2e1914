//! Job execution framework
//!
//! A [`Job`] wraps one unit of work (train, predict, create-model, push,
//! delete) with a guaranteed result shape, an exclusively owned output
//! directory, and status tracking. The [`runner`](JobRunner) drives the
//! lifecycle state machine:
//!
//! ```text
//! NOT_STARTED -> IN_PROGRESS -> { SUCCESS, FAILURE }
//! ```
//!
//! with `REVOKED` reachable through an external cancellation signal and
//! `UNKNOWN` reserved for states reported by collaborators the runner cannot
//! interpret.

mod kinds;
mod runner;

pub use kinds::{
    CreateModelJob, DeleteModelJob, JobRegistry, PredictJob, PushModelJob, TrainJob,
};
pub use runner::{JobOutcome, JobRunner};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::trainer::TrainerError;

/// Errors raised inside a job body.
///
/// Caught at the job boundary and converted to FAILURE status; they never
/// propagate past the running job to sibling variants.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("trainer error: {0}")]
    Trainer(#[from] TrainerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("job \"{job}\" produced a result without required key \"{key}\"")]
    MissingResultKey { job: String, key: String },

    #[error("{0}")]
    Failed(String),
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Created, body not yet entered.
    NotStarted,
    /// Output directory exists and the body is running.
    InProgress,
    /// Body returned a well-formed result payload.
    Success,
    /// Body raised an error; the captured failure rides on the outcome.
    Failure,
    /// Externally cancelled before completion.
    Revoked,
    /// A collaborator reported a state the runner cannot interpret.
    Unknown,
}

impl JobStatus {
    /// True for states no further transition leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Failure | JobStatus::Revoked
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobStatus::NotStarted => "NOT_STARTED",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Success => "SUCCESS",
            JobStatus::Failure => "FAILURE",
            JobStatus::Revoked => "REVOKED",
            JobStatus::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Which layer a captured failure came from, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Malformed definition; aborts the whole run.
    Configuration,
    /// Object construction failed; aborts one variant.
    Instantiation,
    /// The job body raised; converted to FAILURE status.
    JobExecution,
    /// Output-directory bookkeeping failed; recorded, never escalated.
    Cleanup,
}

/// A captured failure: its layer plus the rendered message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    /// Which error layer produced this failure.
    pub kind: FailureKind,
    /// Rendered error message.
    pub message: String,
}

impl JobFailure {
    /// Capture an error under the given kind.
    pub fn new(kind: FailureKind, error: &dyn std::fmt::Display) -> Self {
        Self {
            kind,
            message: error.to_string(),
        }
    }
}

/// A job's result payload: a mapping with at least the keys the job contract
/// promises.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobResult {
    payload: serde_json::Map<String, Value>,
}

impl JobResult {
    /// Empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style entry insertion.
    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Insert an entry.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.payload.insert(key.into(), value.into());
    }

    /// Look up an entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// True if the payload holds `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.payload.contains_key(key)
    }

    /// Iterate entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.payload.iter()
    }
}

/// Cancellation signal shared between the runner and an external controller.
///
/// Revoking is sticky: once set, every in-flight and queued job observing the
/// token finishes as REVOKED.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, un-revoked token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation.
    pub fn revoke(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once cancellation was signalled.
    pub fn is_revoked(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-job execution environment handed to the job body.
#[derive(Debug, Clone)]
pub struct JobContext {
    /// Scratch/result directory owned exclusively by this job.
    pub output_dir: PathBuf,
    /// Cancellation signal; long bodies may poll it.
    pub cancel: CancelToken,
}

impl JobContext {
    /// Context rooted at `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>, cancel: CancelToken) -> Self {
        Self {
            output_dir: output_dir.into(),
            cancel,
        }
    }

    /// Path of a file inside the job's output directory.
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}

/// A unit of executable work.
///
/// The runner owns the lifecycle; implementations only provide the body and
/// the result-shape contract.
pub trait Job: Send {
    /// Job kind name used in reports and output paths.
    fn name(&self) -> &str;

    /// Keys the result payload promises on success.
    fn required_keys(&self) -> &'static [&'static str];

    /// Execute the body. The output directory exists when this runs.
    fn run(&mut self, ctx: &JobContext) -> Result<JobResult, JobError>;
}

/// Recursively delete a job output directory.
///
/// Idempotent: an already-absent directory is a no-op, not an error.
pub fn delete_output_dir(path: &Path) -> std::io::Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_dir_all(path)?;
    Ok(true)
}
