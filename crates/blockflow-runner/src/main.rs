//! blockflow - run block workflow scenes from the command line

mod cli;
mod config;
mod error;
mod runner;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use block_engine::{AbortSignal, StepStatus, ValidationResult, WorkflowRunResult};
use clap::Parser;

use crate::cli::{Cli, Command};
use crate::config::{RunnerConfig, DEFAULT_CONFIG_FILE};
use crate::error::Result;
use crate::runner::{load_scene, save_scene, RunScope, Runner};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    match execute(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::from(2)
        }
    }
}

async fn load_config(path: Option<&Path>) -> Result<RunnerConfig> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    Ok(RunnerConfig::load(&path).await?)
}

/// Run one command; `Ok(false)` means it ran but the scene did not pass
async fn execute(cli: Cli) -> Result<bool> {
    let config = load_config(cli.config.as_deref()).await?;
    let runner = Runner::new(config);

    match cli.command {
        Command::Run {
            scene: path,
            start,
            downstream,
            write,
        } => {
            let scene = load_scene(&path).await?;
            let scope = match (start, downstream) {
                (Some(id), _) => RunScope::StartAt(id),
                (None, Some(id)) => RunScope::Downstream(id),
                (None, None) => RunScope::All,
            };

            let abort = AbortSignal::new();
            let on_interrupt = abort.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("Interrupted, cancelling after the current block");
                    on_interrupt.abort();
                }
            });

            let result = runner.run(&scene, scope, abort).await?;
            print_run(&result, cli.json)?;
            if write {
                save_scene(&scene, &path).await?;
            }
            Ok(result.success)
        }
        Command::Validate { scene: path } => {
            let scene = load_scene(&path).await?;
            let validation = runner.validate(&scene)?;
            print_validation(&validation, cli.json)?;
            Ok(validation.valid)
        }
        Command::Reset { scene: path, write } => {
            let scene = load_scene(&path).await?;
            let count = runner.reset(&scene)?;
            println!("Reset {} instances", count);
            if write {
                save_scene(&scene, &path).await?;
            }
            Ok(true)
        }
        Command::Catalog { category } => {
            let definitions = runner.catalog(category.as_deref())?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&definitions)?);
            } else {
                for definition in definitions {
                    let inputs: Vec<&str> = definition.inputs.iter().map(|p| p.id.as_str()).collect();
                    let outputs: Vec<&str> = definition.outputs.iter().map(|p| p.id.as_str()).collect();
                    println!(
                        "{:<16} {:<12} in: [{}] out: [{}]",
                        definition.block_type,
                        format!("{:?}", definition.category).to_lowercase(),
                        inputs.join(", "),
                        outputs.join(", ")
                    );
                }
            }
            Ok(true)
        }
    }
}

fn print_validation(validation: &ValidationResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(validation)?);
        return Ok(());
    }
    for issue in &validation.errors {
        println!("error   {}", issue);
    }
    for issue in &validation.warnings {
        println!("warning {}", issue);
    }
    println!(
        "{}: {} errors, {} warnings",
        if validation.valid { "valid" } else { "invalid" },
        validation.errors.len(),
        validation.warnings.len()
    );
    Ok(())
}

fn print_run(result: &WorkflowRunResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    for step in &result.steps {
        let marker = match step.status {
            StepStatus::Completed => "ok",
            StepStatus::Failed => "FAILED",
            StepStatus::NotRun => "-",
            StepStatus::SkippedBeforeStart => "skipped",
            StepStatus::SkippedDueToCycle => "cycle",
        };
        println!("{:<8} {}", marker, step.instance_id);
    }
    for warning in &result.validation.warnings {
        println!("warning {}", warning);
    }
    match &result.failure {
        None => println!("Run {} completed {}/{} blocks", result.run_id, result.completed, result.total),
        Some(failure) => println!("Run {} failed: {}", result.run_id, failure),
    }
    Ok(())
}
