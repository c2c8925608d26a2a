//! `summary` command: score a saved snapshot without touching the server

use crate::config::SonarConfig;
use crate::scoring::{riskiest_branches, HealthScorer, Kpi, KpiReport, StatusBand};
use crate::snapshot;
use anyhow::Result;
use console::{style, StyledObject};
use std::path::Path;

fn band_style(band: StatusBand) -> StyledObject<&'static str> {
    let label = style(band.label());
    match band {
        StatusBand::Excellent | StatusBand::Good => label.green(),
        StatusBand::Warning => label.yellow(),
        StatusBand::Danger | StatusBand::Critical => label.red(),
    }
}

fn kpi_line(name: &str, kpi: &Kpi, unit: &str) {
    println!(
        "  {:<26} {:>8.1}{:<2} {}",
        name,
        kpi.value,
        unit,
        band_style(kpi.band)
    );
}

pub fn run(path: &Path, json: bool, top: usize, config: &SonarConfig) -> Result<()> {
    let snap = snapshot::load(path)?;

    // Recomputed so edited thresholds apply to old snapshots
    let scorer = HealthScorer::new(&config.thresholds.health);
    let score = scorer.calculate(&snap.projects);
    let kpis = KpiReport::compute(&snap, &score, &config.thresholds);
    let risky = riskiest_branches(&snap, top);

    if json {
        let out = serde_json::json!({
            "health": score,
            "kpis": kpis,
            "riskiest_branches": risky,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!(
        "\n{} {} ({})\n",
        style("Snapshot").bold(),
        style(&snap.sonar_url).cyan(),
        snap.collection_date.format("%Y-%m-%d %H:%M UTC")
    );
    println!("{}\n", scorer.explain(&score));

    println!("{}", style("KPIs").bold());
    kpi_line("Health", &kpis.health, "");
    kpi_line("Quality gate pass rate", &kpis.qg_pass_rate, "%");
    kpi_line("Coverage", &kpis.coverage, "%");
    kpi_line("Duplication", &kpis.duplication, "%");
    kpi_line("Bugs / KLOC", &kpis.bugs_per_kloc, "");
    kpi_line("Vulnerabilities / KLOC", &kpis.vulnerabilities_per_kloc, "");
    println!(
        "  {} projects, {} branches, {} blockers, {} branches with CRITICAL issues, {} hotspots",
        kpis.total_projects,
        kpis.total_branches,
        style(kpis.blocker_issues).red(),
        kpis.branches_with_critical,
        kpis.total_hotspots
    );

    if !snap.diagnostics.is_empty() {
        println!(
            "  {} {} collection errors recorded",
            style("[!!]").yellow(),
            snap.diagnostics.len()
        );
    }

    if risky.is_empty() {
        return Ok(());
    }
    println!("\n{}", style("Riskiest branches").bold());
    for (i, entry) in risky.iter().enumerate() {
        println!(
            "  {:>2}. {:>6.1}  {} [{}]  {} bugs, {} vulnerabilities, {:.1}% coverage",
            i + 1,
            entry.risk_score,
            style(&entry.project).cyan(),
            entry.branch,
            entry.bugs,
            entry.vulnerabilities,
            entry.coverage
        );
    }
    Ok(())
}
