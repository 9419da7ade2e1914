//! Built-in job kinds and the job registry
//!
//! Each kind is a thin body over the trainer seam plus a result-shape
//! contract. Kinds are looked up by name through [`JobRegistry`], a
//! registration table parallel to the object registry: job definitions are
//! typed definitions whose tag names a registered kind.

use std::collections::HashMap;
use std::path::PathBuf;

use serde_json::json;
use sha2::{Digest, Sha256};

use crate::object::{resolve_fields, FieldSpec, ObjectError, ObjectRegistry};
use crate::trainer::TraceTrainer;
use crate::variable::TypedVariable;

use super::{delete_output_dir, Job, JobContext, JobError, JobResult};

/// Train the model and report loss and timing.
pub struct TrainJob {
    trainer: Box<dyn TraceTrainer>,
}

impl TrainJob {
    /// Wrap a trainer.
    pub fn new(trainer: Box<dyn TraceTrainer>) -> Self {
        Self { trainer }
    }
}

impl Job for TrainJob {
    fn name(&self) -> &str {
        "train"
    }

    fn required_keys(&self) -> &'static [&'static str] {
        &["loss", "elapsed_secs"]
    }

    fn run(&mut self, _ctx: &JobContext) -> Result<JobResult, JobError> {
        let metrics = self.trainer.perform_training()?;
        Ok(JobResult::new()
            .with_entry("loss", metrics.loss)
            .with_entry("elapsed_secs", metrics.elapsed_secs))
    }
}

/// Score candidate trace links.
pub struct PredictJob {
    trainer: Box<dyn TraceTrainer>,
}

impl PredictJob {
    /// Wrap a trainer.
    pub fn new(trainer: Box<dyn TraceTrainer>) -> Self {
        Self { trainer }
    }
}

impl Job for PredictJob {
    fn name(&self) -> &str {
        "predict"
    }

    fn required_keys(&self) -> &'static [&'static str] {
        &["scores", "source_ids", "target_ids"]
    }

    fn run(&mut self, _ctx: &JobContext) -> Result<JobResult, JobError> {
        let output = self.trainer.perform_prediction()?;
        Ok(JobResult::new()
            .with_entry("scores", json!(output.scores))
            .with_entry("source_ids", json!(output.source_ids))
            .with_entry("target_ids", json!(output.target_ids)))
    }
}

/// Train, persist the model into the job's output directory, and report the
/// artifact path and content hash.
pub struct CreateModelJob {
    trainer: Box<dyn TraceTrainer>,
}

impl CreateModelJob {
    /// Wrap a trainer.
    pub fn new(trainer: Box<dyn TraceTrainer>) -> Self {
        Self { trainer }
    }
}

impl Job for CreateModelJob {
    fn name(&self) -> &str {
        "create_model"
    }

    fn required_keys(&self) -> &'static [&'static str] {
        &["model_path", "model_hash", "loss"]
    }

    fn run(&mut self, ctx: &JobContext) -> Result<JobResult, JobError> {
        let metrics = self.trainer.perform_training()?;
        let model_path = ctx.output_path("model.json");
        self.trainer.save_model(&model_path)?;
        let hash = artifact_hash(&std::fs::read(&model_path)?);

        Ok(JobResult::new()
            .with_entry("model_path", model_path.display().to_string())
            .with_entry("model_hash", hash)
            .with_entry("loss", metrics.loss))
    }
}

/// Persist the model and publish it to the model hub.
pub struct PushModelJob {
    trainer: Box<dyn TraceTrainer>,
}

impl PushModelJob {
    /// Wrap a trainer.
    pub fn new(trainer: Box<dyn TraceTrainer>) -> Self {
        Self { trainer }
    }
}

impl Job for PushModelJob {
    fn name(&self) -> &str {
        "push_model"
    }

    fn required_keys(&self) -> &'static [&'static str] {
        &["model_path", "pushed"]
    }

    fn run(&mut self, ctx: &JobContext) -> Result<JobResult, JobError> {
        let model_path = ctx.output_path("model.json");
        self.trainer.save_model(&model_path)?;
        self.trainer.push_to_hub(&model_path)?;

        Ok(JobResult::new()
            .with_entry("model_path", model_path.display().to_string())
            .with_entry("pushed", true))
    }
}

/// Remove a prior job's model artifact or output directory.
///
/// Degenerate job: no trainer, no retry-sensitive state. Deleting an absent
/// target is a no-op success.
pub struct DeleteModelJob {
    model_path: PathBuf,
}

impl DeleteModelJob {
    /// Delete `model_path` when run.
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
        }
    }
}

impl Job for DeleteModelJob {
    fn name(&self) -> &str {
        "delete_model"
    }

    fn required_keys(&self) -> &'static [&'static str] {
        &["deleted"]
    }

    fn run(&mut self, _ctx: &JobContext) -> Result<JobResult, JobError> {
        let existed = if self.model_path.is_file() {
            std::fs::remove_file(&self.model_path)?;
            true
        } else {
            delete_output_dir(&self.model_path)?
        };
        Ok(JobResult::new()
            .with_entry("deleted", self.model_path.display().to_string())
            .with_entry("existed", existed))
    }
}

/// Content hash of a saved model artifact.
fn artifact_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    format!("sha256-{}", hex::encode(&digest[..16]))
}

type JobBuilder =
    Box<dyn Fn(&TypedVariable, &ObjectRegistry) -> Result<Box<dyn Job>, ObjectError> + Send + Sync>;

/// Maps job kind names to job builders.
///
/// Trainers named inside job definitions are built through the object
/// registry passed at build time, so custom trainers compose with the
/// built-in kinds.
#[derive(Default)]
pub struct JobRegistry {
    builders: HashMap<String, JobBuilder>,
}

impl JobRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the five built-in kinds.
    pub fn with_defaults() -> Self {
        const TRAINER_ONLY: &[FieldSpec] = &[FieldSpec::required("trainer")];
        const MODEL_PATH_ONLY: &[FieldSpec] = &[FieldSpec::required("model_path")];

        let mut registry = Self::new();
        registry.register("train", |typed, objects| {
            let mut fields = resolve_fields("train", TRAINER_ONLY, &typed.body, objects)?;
            Ok(Box::new(TrainJob::new(fields.take_object("trainer")?)) as Box<dyn Job>)
        });
        registry.register("predict", |typed, objects| {
            let mut fields = resolve_fields("predict", TRAINER_ONLY, &typed.body, objects)?;
            Ok(Box::new(PredictJob::new(fields.take_object("trainer")?)) as Box<dyn Job>)
        });
        registry.register("create_model", |typed, objects| {
            let mut fields = resolve_fields("create_model", TRAINER_ONLY, &typed.body, objects)?;
            Ok(Box::new(CreateModelJob::new(fields.take_object("trainer")?)) as Box<dyn Job>)
        });
        registry.register("push_model", |typed, objects| {
            let mut fields = resolve_fields("push_model", TRAINER_ONLY, &typed.body, objects)?;
            Ok(Box::new(PushModelJob::new(fields.take_object("trainer")?)) as Box<dyn Job>)
        });
        registry.register("delete_model", |typed, objects| {
            let fields = resolve_fields("delete_model", MODEL_PATH_ONLY, &typed.body, objects)?;
            Ok(Box::new(DeleteModelJob::new(fields.str_field("model_path")?)) as Box<dyn Job>)
        });
        registry
    }

    /// Register a kind under an explicit name.
    pub fn register<F>(&mut self, name: &str, builder: F)
    where
        F: Fn(&TypedVariable, &ObjectRegistry) -> Result<Box<dyn Job>, ObjectError>
            + Send
            + Sync
            + 'static,
    {
        self.builders
            .insert(name.to_ascii_lowercase(), Box::new(builder));
    }

    /// Registered kind names, sorted.
    pub fn kind_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build the job a typed definition describes.
    pub fn build(
        &self,
        typed: &TypedVariable,
        objects: &ObjectRegistry,
    ) -> Result<Box<dyn Job>, ObjectError> {
        let builder = self
            .builders
            .get(&typed.object_type.to_ascii_lowercase())
            .ok_or_else(|| ObjectError::UnknownType(typed.object_type.clone()))?;
        builder(typed, objects)
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("kinds", &self.kind_names())
            .finish()
    }
}
