//! Experiment run reports
//!
//! The user-visible record of a run: one entry per variant with its resolved
//! parameter summary, per-step statuses, and captured failures. A failed grid
//! point is always identifiable from its label and params, never a bare
//! error without the variant's coordinates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::expand::VariedParam;
use crate::job::{FailureKind, JobFailure, JobOutcome, JobResult, JobStatus};

/// Full record of one experiment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentReport {
    /// Experiment name from the manifest.
    pub experiment: String,
    /// Experiment version from the manifest.
    pub version: String,
    /// Seed recorded for downstream reproducibility, if declared.
    pub seed: Option<u64>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// One entry per expanded variant, in variant-index order.
    pub variants: Vec<VariantReport>,
}

impl ExperimentReport {
    /// Number of variants that reached SUCCESS.
    pub fn succeeded(&self) -> usize {
        self.count(JobStatus::Success)
    }

    /// Number of variants that reached FAILURE.
    pub fn failed(&self) -> usize {
        self.count(JobStatus::Failure)
    }

    /// Number of variants that were revoked.
    pub fn revoked(&self) -> usize {
        self.count(JobStatus::Revoked)
    }

    fn count(&self, status: JobStatus) -> usize {
        self.variants.iter().filter(|v| v.status == status).count()
    }
}

/// Record of one expanded variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantReport {
    /// Canonical variant index.
    pub index: usize,
    /// Human-readable grid-point label.
    pub label: String,
    /// Which axis took which value in this variant.
    pub params: Vec<VariedParam>,
    /// Aggregate status: SUCCESS only when every step succeeded.
    pub status: JobStatus,
    /// Per-step records, in execution order.
    pub steps: Vec<StepReport>,
}

impl VariantReport {
    /// Aggregate step statuses: any revocation wins over failure, failure
    /// over success.
    pub fn aggregate_status(steps: &[StepReport]) -> JobStatus {
        if steps.iter().any(|s| s.status == JobStatus::Revoked) {
            JobStatus::Revoked
        } else if steps.iter().any(|s| s.status == JobStatus::Failure) {
            JobStatus::Failure
        } else {
            JobStatus::Success
        }
    }
}

/// Record of one step within a variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    /// Step position within the variant.
    pub step: usize,
    /// Job kind name.
    pub job: String,
    /// Terminal status; NOT_STARTED for steps skipped after a failure.
    pub status: JobStatus,
    /// Body executions performed.
    pub attempts: usize,
    /// Result payload on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    /// Captured failure, when one occurred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    /// Output-directory cleanup problem, if one occurred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup_error: Option<String>,
}

impl StepReport {
    /// Record for an executed job.
    pub fn from_outcome(step: usize, outcome: JobOutcome) -> Self {
        Self {
            step,
            job: outcome.job,
            status: outcome.status,
            attempts: outcome.attempts,
            result: outcome.result,
            error: outcome.error,
            cleanup_error: outcome.cleanup_error,
        }
    }

    /// Record for a step whose job could not be constructed.
    pub fn instantiation_failure(step: usize, job: &str, error: &dyn std::fmt::Display) -> Self {
        Self {
            step,
            job: job.to_string(),
            status: JobStatus::Failure,
            attempts: 0,
            result: None,
            error: Some(JobFailure::new(FailureKind::Instantiation, &error)),
            cleanup_error: None,
        }
    }

    /// Record for a step skipped because an earlier step failed.
    pub fn not_run(step: usize, job: &str) -> Self {
        Self {
            step,
            job: job.to_string(),
            status: JobStatus::NotStarted,
            attempts: 0,
            result: None,
            error: None,
            cleanup_error: None,
        }
    }
}
