//! Dojo CLI: train pseudopotentials and inspect their reports.
//!
//! Commands:
//! - `train`: run pseudopotentials up the validation ladder
//! - `status`: print each pseudopotential's current level from its report
//! - `levels`: list the registered levels and their report keys
//!
//! Challenges are handed to an external engine through `ResultFileRunner`:
//! each level directory gets a `challenge.json` request and is expected to
//! hold a `results.json` written by the engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dojo_core::{ReportDir, ResultFileRunner};
use dojo_runner::{
    save_outcomes, standard_levels, Dojo, DojoConfig, LevelRegistry, StdoutProgress,
};

#[derive(Parser)]
#[command(name = "dojo", about = "Pseudopotential dojo: staged validation ladder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train pseudopotentials through every level they are eligible for.
    Train {
        /// Pseudopotential files.
        #[arg(required = true)]
        pseudos: Vec<PathBuf>,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory holding the `.djrepo` reports.
        #[arg(long, default_value = ".")]
        report_dir: PathBuf,

        /// Parent of the DOJO_<key> working directories (overrides the config).
        #[arg(long)]
        workdir: Option<PathBuf>,

        /// Pseudopotentials trained concurrently (overrides the config).
        #[arg(long)]
        threads: Option<usize>,

        /// Stop starting new pseudopotentials after the first failure.
        #[arg(long, default_value_t = false)]
        fail_fast: bool,

        /// Write outcomes to this file (.json or .csv).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the current level of each pseudopotential.
    Status {
        /// Pseudopotential files.
        #[arg(required = true)]
        pseudos: Vec<PathBuf>,

        /// Directory holding the `.djrepo` reports.
        #[arg(long, default_value = ".")]
        report_dir: PathBuf,
    },
    /// List the training levels.
    Levels {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            pseudos,
            config,
            report_dir,
            workdir,
            threads,
            fail_fast,
            output,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(workdir) = workdir {
                config.workdir_root = workdir;
            }
            if let Some(threads) = threads {
                config.threads = threads;
            }
            config.continue_on_failure &= !fail_fast;
            run_train(pseudos, &config, &report_dir, output.as_deref())
        }
        Commands::Status {
            pseudos,
            report_dir,
        } => run_status(pseudos, &report_dir),
        Commands::Levels { config } => run_levels(&load_config(config.as_deref())?),
    }
}

fn load_config(path: Option<&Path>) -> Result<DojoConfig> {
    match path {
        Some(path) => DojoConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(DojoConfig::default()),
    }
}

fn build_registry(config: &DojoConfig) -> Result<LevelRegistry> {
    let runner = Arc::new(ResultFileRunner::new());
    Ok(LevelRegistry::from_levels(standard_levels(runner, config))?)
}

fn build_dojo(config: &DojoConfig, report_dir: &Path, pseudos: Vec<PathBuf>) -> Result<Dojo> {
    let registry = build_registry(config)?;
    let mut dojo = Dojo::new(registry, Arc::new(ReportDir::new(report_dir)))?;
    dojo.submit(pseudos)?;
    Ok(dojo)
}

fn run_train(
    pseudos: Vec<PathBuf>,
    config: &DojoConfig,
    report_dir: &Path,
    output: Option<&Path>,
) -> Result<()> {
    let dojo = build_dojo(config, report_dir, pseudos)?;
    let summary = dojo.run(config, Some(&StdoutProgress), None)?;

    println!();
    summary.ladder_summary(dojo.registry()).display();

    for outcome in &summary.outcomes {
        if let Some(detail) = outcome.status.detail() {
            eprintln!("{} {}: {detail}", outcome.pseudo, outcome.status.label());
        }
    }

    if let Some(path) = output {
        save_outcomes(&summary, path)?;
        println!("Outcomes saved to: {}", path.display());
    }

    if summary.failure_count() > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn run_status(pseudos: Vec<PathBuf>, report_dir: &Path) -> Result<()> {
    let dojo = build_dojo(&DojoConfig::default(), report_dir, pseudos)?;

    for pseudo in dojo.pseudos() {
        match dojo.load_report(pseudo) {
            Ok(report) => {
                let level = match dojo.keys().current_level(&report) {
                    Some(level) => format!("level {level}"),
                    None => "untested".to_string(),
                };
                let keys: Vec<&str> = report.keys().collect();
                println!("{pseudo}: {level} [{}]", keys.join(", "));
            }
            Err(e) => println!("{pseudo}: {e}"),
        }
    }

    Ok(())
}

fn run_levels(config: &DojoConfig) -> Result<()> {
    let registry = build_registry(config)?;

    println!("{:<6} {:<20} REPORT KEY", "LEVEL", "NAME");
    for level in registry.iter() {
        println!("{:<6} {:<20} {}", level.level(), level.name(), level.report_key());
    }

    Ok(())
}
