//! Trazar CLI
//!
//! Single entry point for running, validating, and inspecting trace-link
//! experiment manifests.
//!
//! # Usage
//!
//! ```bash
//! # Run every variant of an experiment
//! trazar run experiment.yaml
//!
//! # Run with overrides
//! trazar run experiment.yaml --max-attempts 3 --output-root ./scratch
//!
//! # Validate a manifest
//! trazar validate experiment.yaml --detailed
//!
//! # Show the expanded grid
//! trazar expand experiment.yaml
//!
//! # Show manifest info
//! trazar info experiment.yaml --format yaml
//! ```

use clap::Parser;
use std::process::ExitCode;

use trazar::config::{
    apply_overrides, load_manifest, validate_manifest, Cli, Command, ExpandArgs, InfoArgs,
    OutputFormat, RunArgs, ValidateArgs,
};
use trazar::experiment::{plan, ExperimentReport, ExperimentRunner};
use trazar::job::{JobRegistry, JobStatus};
use trazar::object::ObjectRegistry;
use trazar::trainer::{register_trainer, VsmTrainer};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        LogLevel::Quiet
    } else if cli.verbose {
        LogLevel::Verbose
    } else {
        LogLevel::Normal
    };

    let result = match cli.command {
        Command::Run(args) => run_experiment(args, log_level),
        Command::Validate(args) => run_validate(args, log_level),
        Command::Expand(args) => run_expand(args, log_level),
        Command::Info(args) => run_info(args, log_level),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum LogLevel {
    Quiet,
    Normal,
    Verbose,
}

fn log(level: LogLevel, required: LogLevel, msg: &str) {
    if level != LogLevel::Quiet && (level == required || required == LogLevel::Normal) {
        println!("{msg}");
    }
}

/// Registries with the built-in trainer and job kinds.
fn default_registries() -> (ObjectRegistry, JobRegistry) {
    let mut objects = ObjectRegistry::new();
    register_trainer::<VsmTrainer>(&mut objects);
    (objects, JobRegistry::with_defaults())
}

fn run_experiment(args: RunArgs, level: LogLevel) -> Result<(), String> {
    log(
        level,
        LogLevel::Normal,
        &format!("Trazar: running {}", args.manifest.display()),
    );

    let mut manifest =
        load_manifest(&args.manifest).map_err(|e| format!("Manifest error: {e}"))?;
    validate_manifest(&manifest).map_err(|e| format!("Manifest error: {e}"))?;
    apply_overrides(&mut manifest, &args);

    let (objects, jobs) = default_registries();
    let runner = ExperimentRunner::new(&objects, &jobs);
    let report = runner.run(&manifest).map_err(|e| format!("Run error: {e}"))?;

    match args.format {
        OutputFormat::Text => print_report(&report, level),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| format!("JSON serialization error: {e}"))?;
            println!("{json}");
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(&report)
                .map_err(|e| format!("YAML serialization error: {e}"))?;
            println!("{yaml}");
        }
    }

    Ok(())
}

fn print_report(report: &ExperimentReport, level: LogLevel) {
    log(
        level,
        LogLevel::Normal,
        &format!(
            "Experiment {} v{}: {} variants ({} succeeded, {} failed, {} revoked)",
            report.experiment,
            report.version,
            report.variants.len(),
            report.succeeded(),
            report.failed(),
            report.revoked(),
        ),
    );

    for variant in &report.variants {
        log(
            level,
            LogLevel::Normal,
            &format!("  [{}] {} - {}", variant.index, variant.label, variant.status),
        );
        for step in &variant.steps {
            let mut line = format!(
                "      step {} {}: {} ({} attempts)",
                step.step, step.job, step.status, step.attempts
            );
            if let Some(failure) = &step.error {
                line.push_str(&format!(" [{:?}: {}]", failure.kind, failure.message));
            }
            if let Some(cleanup) = &step.cleanup_error {
                line.push_str(&format!(" [cleanup: {cleanup}]"));
            }
            let required = if step.status == JobStatus::Success {
                LogLevel::Verbose
            } else {
                LogLevel::Normal
            };
            log(level, required, &line);
        }
    }
}

fn run_validate(args: ValidateArgs, level: LogLevel) -> Result<(), String> {
    log(
        level,
        LogLevel::Normal,
        &format!("Validating manifest: {}", args.manifest.display()),
    );

    let manifest = load_manifest(&args.manifest).map_err(|e| format!("Manifest error: {e}"))?;
    validate_manifest(&manifest).map_err(|e| format!("Validation failed: {e}"))?;

    // Planning catches what static validation cannot: untyped steps and
    // empty axes revealed only after expansion.
    let plan = plan(&manifest).map_err(|e| format!("Validation failed: {e}"))?;

    log(
        level,
        LogLevel::Normal,
        &format!("Manifest is valid ({} variants)", plan.variants.len()),
    );

    if args.detailed {
        println!();
        println!("Experiment: {} v{}", plan.name, plan.version);
        if let Some(seed) = plan.seed {
            println!("Seed: {seed}");
        }
        for variant in &plan.variants {
            println!("  [{}] {}", variant.index, variant.label());
        }
    }

    Ok(())
}

fn run_expand(args: ExpandArgs, level: LogLevel) -> Result<(), String> {
    let manifest = load_manifest(&args.manifest).map_err(|e| format!("Manifest error: {e}"))?;
    validate_manifest(&manifest).map_err(|e| format!("Manifest error: {e}"))?;
    let plan = plan(&manifest).map_err(|e| format!("Expansion error: {e}"))?;

    match args.format {
        OutputFormat::Text => {
            log(
                level,
                LogLevel::Normal,
                &format!("{} variants:", plan.variants.len()),
            );
            for variant in &plan.variants {
                println!("  [{}] {}", variant.index, variant.label());
                if level == LogLevel::Verbose {
                    println!("      {}", variant.definition.to_json());
                }
            }
        }
        OutputFormat::Json | OutputFormat::Yaml => {
            let grid: Vec<serde_json::Value> = plan
                .variants
                .iter()
                .map(|v| {
                    serde_json::json!({
                        "index": v.index,
                        "label": v.label(),
                        "params": v.params,
                        "definition": v.definition.to_json(),
                    })
                })
                .collect();
            if args.format == OutputFormat::Json {
                let json = serde_json::to_string_pretty(&grid)
                    .map_err(|e| format!("JSON serialization error: {e}"))?;
                println!("{json}");
            } else {
                let yaml = serde_yaml::to_string(&grid)
                    .map_err(|e| format!("YAML serialization error: {e}"))?;
                println!("{yaml}");
            }
        }
    }

    Ok(())
}

fn run_info(args: InfoArgs, level: LogLevel) -> Result<(), String> {
    let manifest = load_manifest(&args.manifest).map_err(|e| format!("Manifest error: {e}"))?;

    match args.format {
        OutputFormat::Text => {
            log(level, LogLevel::Normal, "Manifest Info:");
            println!();
            println!("Name: {} v{}", manifest.name, manifest.version);
            if let Some(description) = &manifest.description {
                println!("Description: {description}");
            }
            if let Some(seed) = manifest.seed {
                println!("Seed: {seed}");
            }
            println!("Output root: {}", manifest.settings.output_root.display());
            println!("Max attempts: {}", manifest.settings.max_attempts);
            println!("Save job output: {}", manifest.settings.save_job_output);

            if let Ok(plan) = plan(&manifest) {
                println!("Variants: {}", plan.variants.len());
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&manifest)
                .map_err(|e| format!("JSON serialization error: {e}"))?;
            println!("{json}");
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(&manifest)
                .map_err(|e| format!("YAML serialization error: {e}"))?;
            println!("{yaml}");
        }
    }

    Ok(())
}
