//! CLI argument parsing
//!
//! # Usage
//!
//! ```bash
//! trazar run experiment.yaml
//! trazar run experiment.yaml --max-attempts 3 --format json
//! trazar validate experiment.yaml --detailed
//! trazar expand experiment.yaml
//! trazar info experiment.yaml --format yaml
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use super::ExperimentManifest;

/// Trazar: trace-link experiment platform
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "trazar")]
#[command(version)]
#[command(about = "Trace-link experiment platform: declarative definitions, grid expansion, job orchestration")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Expand and run every variant of an experiment manifest
    Run(RunArgs),

    /// Validate a manifest without running anything
    Validate(ValidateArgs),

    /// Show the expanded variant grid
    Expand(ExpandArgs),

    /// Display information about a manifest
    Info(InfoArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct RunArgs {
    /// Path to the YAML experiment manifest
    #[arg(value_name = "MANIFEST")]
    pub manifest: PathBuf,

    /// Override the output root directory
    #[arg(short, long)]
    pub output_root: Option<PathBuf>,

    /// Override the per-job attempt budget
    #[arg(long)]
    pub max_attempts: Option<usize>,

    /// Remove failed jobs' output directories instead of keeping them
    #[arg(long)]
    pub discard_failed_output: bool,

    /// Report format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to the YAML experiment manifest
    #[arg(value_name = "MANIFEST")]
    pub manifest: PathBuf,

    /// Show the expanded grid after validating
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for the expand command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ExpandArgs {
    /// Path to the YAML experiment manifest
    #[arg(value_name = "MANIFEST")]
    pub manifest: PathBuf,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the info command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct InfoArgs {
    /// Path to the YAML experiment manifest
    #[arg(value_name = "MANIFEST")]
    pub manifest: PathBuf,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Report/output rendering format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
}

/// Apply command-line overrides onto a loaded manifest.
pub fn apply_overrides(manifest: &mut ExperimentManifest, args: &RunArgs) {
    if let Some(output_root) = &args.output_root {
        manifest.settings.output_root = output_root.clone();
    }
    if let Some(max_attempts) = args.max_attempts {
        manifest.settings.max_attempts = max_attempts;
    }
    if args.discard_failed_output {
        manifest.settings.save_job_output = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> RunArgs {
        RunArgs {
            manifest: PathBuf::from("exp.yaml"),
            output_root: None,
            max_attempts: None,
            discard_failed_output: false,
            format: OutputFormat::Text,
        }
    }

    #[test]
    fn test_parse_run_command() {
        let cli = Cli::try_parse_from(["trazar", "run", "exp.yaml", "--max-attempts", "3"]).unwrap();
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.manifest, PathBuf::from("exp.yaml"));
                assert_eq!(args.max_attempts, Some(3));
                assert_eq!(args.format, OutputFormat::Text);
            }
            other => panic!("expected run command, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_format_value() {
        let cli =
            Cli::try_parse_from(["trazar", "expand", "exp.yaml", "--format", "json"]).unwrap();
        match cli.command {
            Command::Expand(args) => assert_eq!(args.format, OutputFormat::Json),
            other => panic!("expected expand command, got {other:?}"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["trazar", "--quiet", "validate", "exp.yaml"]).unwrap();
        assert!(cli.quiet);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_apply_overrides() {
        let mut manifest = ExperimentManifest {
            trazar: "1.0".to_string(),
            name: "exp".to_string(),
            version: "1".to_string(),
            description: None,
            seed: None,
            settings: Default::default(),
            definition: serde_json::json!({"steps": []}),
        };

        let mut args = base_args();
        args.output_root = Some(PathBuf::from("/tmp/elsewhere"));
        args.max_attempts = Some(5);
        args.discard_failed_output = true;

        apply_overrides(&mut manifest, &args);
        assert_eq!(manifest.settings.output_root, PathBuf::from("/tmp/elsewhere"));
        assert_eq!(manifest.settings.max_attempts, 5);
        assert!(!manifest.settings.save_job_output);
    }
}
