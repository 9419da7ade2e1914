//! Error types for Trazar

use thiserror::Error;

use crate::config::ManifestError;
use crate::job::JobError;
use crate::object::ObjectError;
use crate::trainer::TrainerError;
use crate::variable::ConfigError;

/// Crate-level error: the union of the per-layer error taxonomies.
///
/// Configuration and manifest errors abort a whole run; instantiation and
/// job errors are isolated to the variant that raised them and reach this
/// type only when surfaced directly by a caller, not through a run report.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("instantiation error: {0}")]
    Object(#[from] ObjectError),

    #[error("job error: {0}")]
    Job(#[from] JobError),

    #[error("trainer error: {0}")]
    Trainer(#[from] TrainerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias over the crate error.
pub type Result<T> = std::result::Result<T, Error>;
