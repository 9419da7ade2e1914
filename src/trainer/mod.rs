//! Trainer seam
//!
//! Jobs call into an opaque trainer through [`TraceTrainer`]; the trainer's
//! internals (model architecture, tokenization, training numerics) live
//! behind this boundary. The crate ships one concrete implementation, the
//! classical vector-space baseline in [`vsm`].

mod vsm;

pub use vsm::{Artifact, VsmTrainer};

use std::any::Any;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::object::{FromDefinition, ObjectRegistry};

/// Errors surfaced by a trainer implementation.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("training failed: {0}")]
    Training(String),

    #[error("prediction failed: {0}")]
    Prediction(String),

    #[error("hub push failed: {0}")]
    Push(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Loss and timing summary of one training pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// Final training loss.
    pub loss: f64,
    /// Wall-clock training time in seconds.
    pub elapsed_secs: f64,
}

/// Scored candidate links between source and target artifacts.
///
/// Parallel arrays: entry `i` scores the pair
/// `(source_ids[i], target_ids[i])`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutput {
    /// Source artifact id per candidate pair.
    pub source_ids: Vec<String>,
    /// Target artifact id per candidate pair.
    pub target_ids: Vec<String>,
    /// Predicted link score per candidate pair.
    pub scores: Vec<f64>,
}

impl PredictionOutput {
    /// Number of scored candidate pairs.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// True if no pairs were scored.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// The external trainer collaborator.
///
/// Implementations may block on model loading and file I/O; the orchestration
/// layer treats each call as an opaque unit of work.
pub trait TraceTrainer: Send {
    /// Fit the model; returns loss and timing.
    fn perform_training(&mut self) -> Result<TrainingMetrics, TrainerError>;

    /// Score candidate trace links.
    fn perform_prediction(&mut self) -> Result<PredictionOutput, TrainerError>;

    /// Persist the model to `path`.
    fn save_model(&mut self, path: &Path) -> Result<(), TrainerError>;

    /// Publish a saved model to the model hub.
    fn push_to_hub(&mut self, model_path: &Path) -> Result<(), TrainerError>;
}

/// Register a trainer type so definitions can name it.
///
/// The built value is stored as `Box<dyn TraceTrainer>`, which is what job
/// builders take out of the resolved fields.
pub fn register_trainer<T>(registry: &mut ObjectRegistry)
where
    T: FromDefinition + TraceTrainer + 'static,
{
    registry.register_with(T::type_name(), |typed, registry| {
        let mut fields =
            crate::object::resolve_fields(T::type_name(), T::fields(), &typed.body, registry)?;
        let trainer = T::from_fields(&mut fields)?;
        Ok(Box::new(Box::new(trainer) as Box<dyn TraceTrainer>) as Box<dyn Any>)
    });
}
