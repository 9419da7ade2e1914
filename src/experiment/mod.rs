//! Experiment orchestration
//!
//! Turns a manifest into runnable work: parse the definition, expand its
//! branching axes into variants, and run each variant's steps sequentially
//! through the job framework. Variants are isolated: one variant's
//! instantiation or execution failure never prevents its siblings from
//! running. Configuration errors, by contrast, abort the whole run before
//! any job executes.
//!
//! # Feedback between steps
//!
//! After each successful step, the step's result payload fills remaining
//! `UNDETERMINED` placeholders in later steps of the same variant, matched
//! by key (case-insensitive, first producer wins). This is how a train
//! step's `model_path` reaches a later delete or push step.

mod report;

pub use report::{ExperimentReport, StepReport, VariantReport};

use std::collections::HashMap;

use chrono::Utc;

use crate::config::{ExperimentManifest, ManifestError};
use crate::error::{Error, Result};
use crate::expand::{expand, Variant};
use crate::job::{CancelToken, JobRegistry, JobRunner};
use crate::object::ObjectRegistry;
use crate::variable::{TypedVariable, Variable};

/// Key of the ordered step list inside a definition root.
pub const STEPS_KEY: &str = "steps";

/// A validated, fully expanded experiment: every variant's steps are typed
/// and branch-free, checked before any job executes.
#[derive(Debug, Clone)]
pub struct ExperimentPlan {
    /// Experiment name.
    pub name: String,
    /// Experiment version.
    pub version: String,
    /// Declared seed, if any.
    pub seed: Option<u64>,
    /// Expanded grid, in canonical variant order.
    pub variants: Vec<Variant>,
}

/// Expand and validate a manifest into an [`ExperimentPlan`].
///
/// Fails on any configuration problem (unparseable definition, missing or
/// empty step list, a step without a type tag) before any job executes.
pub fn plan(manifest: &ExperimentManifest) -> Result<ExperimentPlan> {
    crate::config::validate_manifest(manifest)?;
    let definition = manifest.parsed_definition()?;
    let variants = expand(&definition)?;

    // Every variant must carry a well-formed step list; checking up front
    // keeps malformed definitions from surfacing as per-variant failures.
    for variant in &variants {
        variant_steps(variant)?;
    }

    Ok(ExperimentPlan {
        name: manifest.name.clone(),
        version: manifest.version.clone(),
        seed: manifest.seed,
        variants,
    })
}

/// Extract a variant's ordered step definitions.
pub fn variant_steps(variant: &Variant) -> Result<Vec<TypedVariable>> {
    let steps = match variant.definition.get(STEPS_KEY) {
        Some(Variable::List(items)) if !items.is_empty() => items,
        _ => return Err(Error::Manifest(ManifestError::MissingSteps)),
    };
    let mut typed = Vec::with_capacity(steps.len());
    for step in steps {
        typed.push(step.expect_typed().map_err(Error::Config)?.clone());
    }
    Ok(typed)
}

/// Runs planned experiments against a pair of registries.
pub struct ExperimentRunner<'a> {
    objects: &'a ObjectRegistry,
    jobs: &'a JobRegistry,
}

impl<'a> ExperimentRunner<'a> {
    /// Runner over the given registries.
    pub fn new(objects: &'a ObjectRegistry, jobs: &'a JobRegistry) -> Self {
        Self { objects, jobs }
    }

    /// Plan and run a manifest to completion.
    pub fn run(&self, manifest: &ExperimentManifest) -> Result<ExperimentReport> {
        self.run_with_cancel(manifest, &CancelToken::new())
    }

    /// Plan and run with an externally controlled cancellation token.
    ///
    /// Revoking the token finishes in-flight and queued jobs as REVOKED
    /// without corrupting their output directories.
    pub fn run_with_cancel(
        &self,
        manifest: &ExperimentManifest,
        cancel: &CancelToken,
    ) -> Result<ExperimentReport> {
        let plan = plan(manifest)?;
        let settings = &manifest.settings;
        let runner = JobRunner::new(settings.max_attempts).with_save_output(settings.save_job_output);
        let experiment_root = settings.output_root.join(slugify(&plan.name));

        let started_at = Utc::now();
        let mut variants = Vec::with_capacity(plan.variants.len());

        for variant in &plan.variants {
            // Validated during planning.
            let steps = variant_steps(variant)?;
            let variant_dir = experiment_root.join(format!("variant-{}", variant.index));

            let mut feedback: HashMap<String, serde_json::Value> = HashMap::new();
            let mut step_reports = Vec::with_capacity(steps.len());
            let mut aborted = false;

            for (i, mut step) in steps.into_iter().enumerate() {
                if aborted {
                    step_reports.push(StepReport::not_run(i, &step.object_type));
                    continue;
                }

                step.body.fill_undetermined(&feedback);

                let mut job = match self.jobs.build(&step, self.objects) {
                    Ok(job) => job,
                    Err(e) => {
                        step_reports.push(StepReport::instantiation_failure(
                            i,
                            &step.object_type,
                            &e,
                        ));
                        aborted = true;
                        continue;
                    }
                };

                let step_dir = variant_dir.join(format!("step-{}-{}", i, job.name()));
                let outcome = runner.run(job.as_mut(), &step_dir, cancel);

                if outcome.succeeded() {
                    if let Some(result) = &outcome.result {
                        for (key, value) in result.iter() {
                            feedback.entry(key.clone()).or_insert_with(|| value.clone());
                        }
                    }
                } else {
                    aborted = true;
                }
                step_reports.push(StepReport::from_outcome(i, outcome));
            }

            variants.push(VariantReport {
                index: variant.index,
                label: variant.label(),
                params: variant.params.clone(),
                status: VariantReport::aggregate_status(&step_reports),
                steps: step_reports,
            });
        }

        Ok(ExperimentReport {
            experiment: plan.name,
            version: plan.version,
            seed: plan.seed,
            started_at,
            finished_at: Utc::now(),
            variants,
        })
    }
}

/// Filesystem-safe experiment directory name.
fn slugify(name: &str) -> String {
    let mut slug: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    while slug.contains("--") {
        slug = slug.replace("--", "-");
    }
    slug.trim_matches('-').to_string()
}
