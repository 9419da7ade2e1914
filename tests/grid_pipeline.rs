//! End-to-end grid pipeline tests
//!
//! Drives full manifests through expansion, instantiation, and job
//! execution: grid shape and ordering, per-variant failure isolation, and
//! cross-step feedback of undetermined values.

use std::path::Path;

use serde_json::json;

use trazar::config::{ExperimentManifest, Settings};
use trazar::experiment::{plan, ExperimentRunner};
use trazar::job::{JobRegistry, JobStatus};
use trazar::object::{FieldSpec, FromDefinition, ObjectError, ObjectRegistry, ResolvedFields};
use trazar::trainer::{
    register_trainer, PredictionOutput, TraceTrainer, TrainerError, TrainingMetrics, VsmTrainer,
};

/// Deterministic test trainer with a working hub push.
struct StaticTrainer {
    loss: f64,
}

impl FromDefinition for StaticTrainer {
    fn type_name() -> &'static str {
        "static"
    }

    fn fields() -> &'static [FieldSpec] {
        const FIELDS: &[FieldSpec] = &[FieldSpec::required("loss")];
        FIELDS
    }

    fn from_fields(fields: &mut ResolvedFields) -> Result<Self, ObjectError> {
        Ok(StaticTrainer {
            loss: fields.f64_field("loss")?,
        })
    }
}

impl TraceTrainer for StaticTrainer {
    fn perform_training(&mut self) -> Result<TrainingMetrics, TrainerError> {
        Ok(TrainingMetrics {
            loss: self.loss,
            elapsed_secs: 0.0,
        })
    }

    fn perform_prediction(&mut self) -> Result<PredictionOutput, TrainerError> {
        Ok(PredictionOutput {
            source_ids: vec!["R1".to_string()],
            target_ids: vec!["auth.rs".to_string()],
            scores: vec![1.0 - self.loss],
        })
    }

    fn save_model(&mut self, path: &Path) -> Result<(), TrainerError> {
        std::fs::write(path, serde_json::to_vec(&json!({"loss": self.loss}))?)?;
        Ok(())
    }

    fn push_to_hub(&mut self, model_path: &Path) -> Result<(), TrainerError> {
        let marker = model_path.with_extension("pushed");
        std::fs::write(marker, b"ok")?;
        Ok(())
    }
}

fn registries() -> (ObjectRegistry, JobRegistry) {
    let mut objects = ObjectRegistry::new();
    register_trainer::<VsmTrainer>(&mut objects);
    register_trainer::<StaticTrainer>(&mut objects);
    (objects, JobRegistry::with_defaults())
}

fn manifest(definition: serde_json::Value, output_root: &Path) -> ExperimentManifest {
    ExperimentManifest {
        trazar: "1.0".to_string(),
        name: "grid pipeline".to_string(),
        version: "1".to_string(),
        description: None,
        seed: None,
        settings: Settings {
            output_root: output_root.to_path_buf(),
            save_job_output: true,
            max_attempts: 1,
        },
        definition,
    }
}

fn vsm(min_score: serde_json::Value) -> serde_json::Value {
    json!({
        "objectType": "vsm",
        "sources": [{"id": "R1", "text": "encrypt user passwords"}],
        "targets": [{"id": "auth.rs", "text": "password encryption module"}],
        "min_score": min_score,
    })
}

#[test]
fn two_by_three_grid_runs_six_variants_in_mixed_radix_order() {
    let dir = tempfile::tempdir().unwrap();
    let m = manifest(
        json!({"steps": [
            {"objectType": "train", "trainer": vsm(json!({"*": [0.0, 0.3, 0.6]}))},
            {"objectType": "predict", "trainer": vsm(json!({"*": [0.1, 0.2]}))},
        ]}),
        dir.path(),
    );
    let (objects, jobs) = registries();

    let report = ExperimentRunner::new(&objects, &jobs).run(&m).unwrap();
    assert_eq!(report.variants.len(), 6);
    assert_eq!(report.succeeded(), 6);

    // First-collected axis (the train step's min_score) varies fastest.
    let axis = |i: usize, path: &str| {
        report.variants[i]
            .params
            .iter()
            .find(|p| p.path == path)
            .unwrap()
            .value
            .clone()
    };
    assert_eq!(axis(0, "steps.0.trainer.min_score"), json!(0.0));
    assert_eq!(axis(0, "steps.1.trainer.min_score"), json!(0.1));
    assert_eq!(axis(1, "steps.0.trainer.min_score"), json!(0.3));
    assert_eq!(axis(1, "steps.1.trainer.min_score"), json!(0.1));
    assert_eq!(axis(5, "steps.0.trainer.min_score"), json!(0.6));
    assert_eq!(axis(5, "steps.1.trainer.min_score"), json!(0.2));
}

#[test]
fn expansion_is_deterministic_across_plans() {
    let dir = tempfile::tempdir().unwrap();
    let m = manifest(
        json!({"steps": [
            {"objectType": "train", "trainer": vsm(json!({"*": [0.0, 0.5]}))},
        ]}),
        dir.path(),
    );

    let first = plan(&m).unwrap();
    let second = plan(&m).unwrap();
    assert_eq!(first.variants, second.variants);
}

#[test]
fn one_variant_failure_leaves_siblings_running() {
    let dir = tempfile::tempdir().unwrap();
    // The middle alternative names an unregistered trainer type.
    let m = manifest(
        json!({"steps": [
            {"objectType": "train", "trainer": {"*": [
                vsm(json!(0.0)),
                {"objectType": "ghost"},
                vsm(json!(0.5)),
            ]}},
        ]}),
        dir.path(),
    );
    let (objects, jobs) = registries();

    let report = ExperimentRunner::new(&objects, &jobs).run(&m).unwrap();
    assert_eq!(report.variants.len(), 3);

    let statuses: Vec<JobStatus> = report.variants.iter().map(|v| v.status).collect();
    assert_eq!(
        statuses,
        vec![JobStatus::Success, JobStatus::Failure, JobStatus::Success]
    );

    // The failed grid point is identifiable: label plus captured error.
    let failed = &report.variants[1];
    assert!(failed.label.contains("steps.0.trainer"));
    let failure = failed.steps[0].error.as_ref().unwrap();
    assert!(failure.message.contains("ghost"));
}

#[test]
fn undetermined_model_path_flows_from_create_to_delete() {
    let dir = tempfile::tempdir().unwrap();
    let m = manifest(
        json!({"steps": [
            {"objectType": "create_model", "trainer": {"objectType": "static", "loss": 0.2}},
            {"objectType": "delete_model", "model_path": "UNDETERMINED"},
        ]}),
        dir.path(),
    );
    let (objects, jobs) = registries();

    let report = ExperimentRunner::new(&objects, &jobs).run(&m).unwrap();
    let variant = &report.variants[0];
    assert_eq!(variant.status, JobStatus::Success);

    let create = &variant.steps[0];
    let model_path = create
        .result
        .as_ref()
        .unwrap()
        .get("model_path")
        .unwrap()
        .as_str()
        .unwrap()
        .to_string();

    // The create step wrote the artifact; the delete step then removed it.
    assert!(!Path::new(&model_path).exists());
    let delete = &variant.steps[1];
    assert_eq!(delete.status, JobStatus::Success);
    assert_eq!(
        delete.result.as_ref().unwrap().get("existed"),
        Some(&json!(true))
    );
}

#[test]
fn push_model_publishes_saved_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let m = manifest(
        json!({"steps": [
            {"objectType": "push_model", "trainer": {"objectType": "static", "loss": 0.1}},
        ]}),
        dir.path(),
    );
    let (objects, jobs) = registries();

    let report = ExperimentRunner::new(&objects, &jobs).run(&m).unwrap();
    let step = &report.variants[0].steps[0];
    assert_eq!(step.status, JobStatus::Success);

    let result = step.result.as_ref().unwrap();
    assert_eq!(result.get("pushed"), Some(&json!(true)));
    let model_path = result.get("model_path").unwrap().as_str().unwrap();
    assert!(Path::new(model_path).exists());
    assert!(Path::new(model_path).with_extension("pushed").exists());
}

#[test]
fn step_output_dirs_follow_variant_layout() {
    let dir = tempfile::tempdir().unwrap();
    let m = manifest(
        json!({"steps": [
            {"objectType": "train", "trainer": vsm(json!({"*": [0.0, 0.5]}))},
        ]}),
        dir.path(),
    );
    let (objects, jobs) = registries();

    ExperimentRunner::new(&objects, &jobs).run(&m).unwrap();

    for index in 0..2 {
        let step_dir = dir
            .path()
            .join("grid-pipeline")
            .join(format!("variant-{index}"))
            .join("step-0-train");
        assert!(step_dir.is_dir(), "missing {}", step_dir.display());
    }
}

#[test]
fn configuration_error_aborts_before_any_job_runs() {
    let dir = tempfile::tempdir().unwrap();
    // One step lacks its type tag: a configuration error for the whole run.
    let m = manifest(
        json!({"steps": [
            {"objectType": "train", "trainer": vsm(json!(0.0))},
            {"trainer": vsm(json!(0.0))},
        ]}),
        dir.path(),
    );
    let (objects, jobs) = registries();

    let err = ExperimentRunner::new(&objects, &jobs).run(&m).unwrap_err();
    assert!(err.to_string().contains("objectType"));

    // Nothing executed: no experiment directory was created.
    assert!(!dir.path().join("grid-pipeline").exists());
}

#[test]
fn discarded_output_removes_failed_step_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let mut m = manifest(
        json!({"steps": [
            // The vsm baseline cannot push; the step fails after writing.
            {"objectType": "push_model", "trainer": vsm(json!(0.0))},
        ]}),
        dir.path(),
    );
    m.settings.save_job_output = false;
    let (objects, jobs) = registries();

    let report = ExperimentRunner::new(&objects, &jobs).run(&m).unwrap();
    let step = &report.variants[0].steps[0];
    assert_eq!(step.status, JobStatus::Failure);
    assert!(step.cleanup_error.is_none());

    let step_dir = dir
        .path()
        .join("grid-pipeline")
        .join("variant-0")
        .join("step-0-push_model");
    assert!(!step_dir.exists());
}
