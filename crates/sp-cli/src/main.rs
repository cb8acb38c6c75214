//! stackplot CLI

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use sp_pipeline::{run_plot, YieldsReport};

mod config;
mod provider;

use provider::JsonFileProvider;

#[derive(Parser)]
#[command(name = "stackplot")]
#[command(about = "stackplot - stacked-histogram comparison plots, numbers first")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every configured plot and emit one artifact per plot
    Plot {
        /// Run configuration (YAML)
        #[arg(short, long)]
        config: PathBuf,

        /// Output directory for plot artifacts
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Only produce plots whose name contains this substring
        #[arg(long)]
        only: Option<String>,

        /// Draw the data even inside blinded ranges
        #[arg(short, long)]
        unblind: bool,

        /// Ignore the per-sample and global scale factors
        #[arg(short, long)]
        ignore_scales: bool,

        /// Also write the LaTeX yields table (yields.tex)
        #[arg(short, long)]
        yields: bool,

        /// Skip the plot artifacts; useful with --yields
        #[arg(long)]
        no_plots: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Plot { config, output, only, unblind, ignore_scales, yields, no_plots } => {
            cmd_plot(&config, &output, only.as_deref(), unblind, ignore_scales, yields, no_plots)
        }
    }
}

fn cmd_plot(
    config_path: &PathBuf,
    output: &PathBuf,
    only: Option<&str>,
    unblind: bool,
    ignore_scales: bool,
    yields: bool,
    no_plots: bool,
) -> Result<()> {
    let mut setup = config::load(config_path)?;
    setup.configuration.unblind = unblind;
    setup.configuration.ignore_scales = ignore_scales;

    let root = config_path.parent().unwrap_or_else(|| std::path::Path::new("."));
    let provider = JsonFileProvider::new(root);

    std::fs::create_dir_all(output)
        .with_context(|| format!("cannot create output directory '{}'", output.display()))?;

    let mut report = YieldsReport::default();
    let mut produced = 0usize;
    let mut skipped = 0usize;

    for request in &setup.plots {
        if let Some(needle) = only {
            if !request.name.contains(needle) {
                continue;
            }
        }

        let outcome = match run_plot(
            &setup.configuration,
            request,
            &setup.samples,
            &setup.systematics,
            &provider,
        ) {
            Ok(outcome) => outcome,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                tracing::warn!(plot = %request.name, error = %e, "skipping plot");
                skipped += 1;
                continue;
            }
        };

        outcome.summary.report();
        report.add_plot(request, &setup.samples, &outcome.summary)?;

        if !no_plots {
            let path = output.join(format!("{}.json", request.name));
            let json = serde_json::to_string_pretty(&outcome.artifact)?;
            std::fs::write(&path, json)
                .with_context(|| format!("cannot write '{}'", path.display()))?;
            tracing::info!(plot = %request.name, artifact = %path.display(), "wrote artifact");
        }
        produced += 1;
    }

    if yields && !report.is_empty() {
        let table = report.render_latex(&setup.configuration.yields)?;
        let path = output.join("yields.tex");
        std::fs::write(&path, table)
            .with_context(|| format!("cannot write '{}'", path.display()))?;
        tracing::info!(table = %path.display(), "wrote yields table");
    }

    tracing::info!(produced, skipped, "run complete");
    Ok(())
}
