//! `collect` command: one full run written to the snapshot file

use super::CollectArgs;
use crate::api::SonarClient;
use crate::collector::{Collector, RunError};
use crate::config::SonarConfig;
use crate::models::RunSnapshot;
use crate::snapshot;
use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

pub fn run(args: &CollectArgs, mut config: SonarConfig) -> Result<()> {
    let (url, token) = args.server.resolve(&mut config)?;
    if let Some(workers) = args.workers {
        config.collect.workers = workers;
    }
    let output = args.output.clone().unwrap_or_else(|| config.output.path.clone());

    if config.server.insecure {
        eprintln!(
            "{} TLS certificate validation is disabled",
            style("warning:").yellow().bold()
        );
    }

    let client = SonarClient::connect(config.client_config(&url, &token));
    let options = config.collect_options();

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    println!(
        "\n{} Collecting from {} ({} workers)\n",
        style("sonarscope").bold(),
        style(client.base_url()).cyan(),
        options.workers
    );

    let bar = progress_bar();
    let callback_bar = bar.clone();
    let start = Instant::now();

    let result = Collector::new(&client, options)
        .with_cancel_flag(cancel.clone())
        .with_progress_callback(Box::new(move |name, done, total| {
            callback_bar.set_length(total as u64);
            callback_bar.set_position(done as u64);
            callback_bar.set_message(name.to_string());
        }))
        .run();
    bar.finish_and_clear();

    let snapshot = match result {
        Ok(snapshot) => snapshot,
        Err(RunError::NoProjects { listing: None }) => {
            println!(
                "  {} No projects visible to this token; nothing written",
                style("[--]").dim()
            );
            return Ok(());
        }
        Err(e) => return Err(e).context("Collection failed"),
    };

    snapshot::write_atomic(&snapshot, &output)?;
    print_summary(&snapshot, &output, start.elapsed().as_secs_f64());

    if cancel.load(Ordering::SeqCst) {
        println!(
            "\n  {} Interrupted: snapshot holds only the projects finished before Ctrl-C",
            style("[!!]").yellow()
        );
    }
    Ok(())
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )
    .map(|s| s.progress_chars("█▓▒░  "))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

fn print_summary(snapshot: &RunSnapshot, output: &Path, secs: f64) {
    println!("{}", style("Collection complete").bold());
    println!(
        "  Projects:  {} collected of {}",
        style(snapshot.projects.len()).cyan(),
        snapshot.total_projects
    );
    println!("  Branches:  {}", style(snapshot.branch_count()).cyan());
    println!(
        "  Main gate: {} passed, {} failed, {} none",
        style(snapshot.projects_main_passed).green(),
        style(snapshot.projects_main_failed).red(),
        style(snapshot.projects_main_none).dim()
    );
    println!("  Blockers:  {}", style(snapshot.blocker_count()).red());
    if let Some(ref health) = snapshot.health {
        println!(
            "  Health:    {} ({})",
            style(format!("{:.1}", health.health_score)).bold(),
            health.status.label()
        );
    }

    if snapshot.diagnostics.is_empty() {
        println!("  {} No collection errors", style("[OK]").green());
    } else {
        println!(
            "  {} {} partial failures recorded in diagnostics",
            style("[!!]").yellow(),
            snapshot.diagnostics.len()
        );
    }
    println!(
        "\n  Wrote {} in {:.1}s",
        style(output.display()).cyan(),
        secs
    );
}
