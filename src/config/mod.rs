//! Experiment manifest loading and validation
//!
//! A manifest is the YAML front door to the platform: experiment identity,
//! orchestration settings, and the JSON-compatible `definition` tree that
//! the definition language interprets.
//!
//! # Example
//!
//! ```yaml
//! trazar: "1.0"
//! name: requirements-to-code
//! version: "0.3"
//! seed: 42
//!
//! settings:
//!   output_root: ./runs
//!   max_attempts: 2
//!
//! definition:
//!   steps:
//!     - objectType: train
//!       trainer:
//!         objectType: vsm
//!         sources: [{id: R1, text: encrypt user passwords}]
//!         targets: [{id: auth.rs, text: password encryption module}]
//!         min_score: {"*": [0.0, 0.5]}
//! ```

mod cli;


pub use cli::{apply_overrides, Cli, Command, ExpandArgs, InfoArgs, OutputFormat, RunArgs, ValidateArgs};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::experiment::STEPS_KEY;
use crate::variable::{parse_definition, ConfigError, DefinitionVariable, Variable};

/// The manifest format version this build understands.
pub const MANIFEST_VERSION: &str = "1.0";

/// Errors raised while loading or validating a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unsupported manifest version \"{0}\" (expected \"{MANIFEST_VERSION}\")")]
    UnsupportedVersion(String),

    #[error("experiment name must not be empty")]
    EmptyName,

    #[error("settings.max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("definition must contain a non-empty \"{STEPS_KEY}\" list")]
    MissingSteps,

    #[error(transparent)]
    Definition(#[from] ConfigError),
}

/// Orchestration knobs, passed by reference to the components that need
/// them. There is no process-global configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Root directory under which per-variant output directories live.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,

    /// Keep a failed job's output directory for post-mortem inspection.
    #[serde(default = "default_true")]
    pub save_job_output: bool,

    /// Body executions a job may consume before FAILURE is terminal.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_root: default_output_root(),
            save_job_output: true,
            max_attempts: default_max_attempts(),
        }
    }
}

/// A declarative experiment manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentManifest {
    /// Manifest format version (required, must be "1.0").
    pub trazar: String,

    /// Experiment name (required).
    pub name: String,

    /// Experiment version (required).
    pub version: String,

    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Seed recorded into reports for downstream reproducibility.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Orchestration settings.
    #[serde(default)]
    pub settings: Settings,

    /// Root of the definition language tree.
    pub definition: serde_json::Value,
}

impl ExperimentManifest {
    /// Parse the raw definition into the variable tree.
    pub fn parsed_definition(&self) -> Result<DefinitionVariable, ManifestError> {
        Ok(parse_definition(&self.definition)?)
    }
}

/// Load a manifest from a YAML file.
pub fn load_manifest(path: &Path) -> Result<ExperimentManifest, ManifestError> {
    let text = std::fs::read_to_string(path)?;
    let manifest: ExperimentManifest = serde_yaml::from_str(&text)?;
    Ok(manifest)
}

/// Validate a manifest before planning.
///
/// Checks the format version, identity fields, settings ranges, that the
/// definition parses, and that it carries a step list. Step-level typing is
/// checked per expanded variant during planning.
pub fn validate_manifest(manifest: &ExperimentManifest) -> Result<(), ManifestError> {
    if manifest.trazar != MANIFEST_VERSION {
        return Err(ManifestError::UnsupportedVersion(manifest.trazar.clone()));
    }
    if manifest.name.trim().is_empty() {
        return Err(ManifestError::EmptyName);
    }
    if manifest.settings.max_attempts == 0 {
        return Err(ManifestError::ZeroAttempts);
    }

    let definition = manifest.parsed_definition()?;
    match definition.get(STEPS_KEY) {
        Some(Variable::List(items)) if !items.is_empty() => Ok(()),
        // A branching axis over whole step lists expands before step checks.
        Some(Variable::Multi(_)) => Ok(()),
        _ => Err(ManifestError::MissingSteps),
    }
}

fn default_output_root() -> PathBuf {
    PathBuf::from("./runs")
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> usize {
    1
}
