//! Composite health score over a whole run

use super::bands::{StatusBand, Thresholds};
use crate::models::{MetricKey, ProjectSnapshot, QualityGateStatus};
use serde::{Deserialize, Serialize};
use tracing::debug;

const QUALITY_GATE_WEIGHT: f64 = 30.0;
const COVERAGE_WEIGHT: f64 = 25.0;
const DUPLICATION_WEIGHT: f64 = 20.0;
const BLOCKER_WEIGHT: f64 = 25.0;

/// Run-level figures the score is computed from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthInputs {
    pub total_projects: usize,
    /// Projects whose main branch has a gate verdict
    pub gated_projects: usize,
    pub passed_projects: usize,
    /// Percent of gated projects passing; 0 when none are gated
    pub qg_pass_rate: f64,
    /// Mean over branches reporting coverage > 0
    pub avg_coverage: f64,
    pub coverage_branches: usize,
    /// Mean over branches reporting a duplication value
    pub avg_duplication: f64,
    pub duplication_branches: usize,
    pub projects_with_blockers: usize,
}

impl HealthInputs {
    pub fn from_projects(projects: &[ProjectSnapshot]) -> Self {
        let mut inputs = HealthInputs {
            total_projects: projects.len(),
            ..Default::default()
        };

        let mut coverage_sum = 0.0;
        let mut duplication_sum = 0.0;

        for project in projects {
            match project.main_qg_status {
                QualityGateStatus::Ok => {
                    inputs.gated_projects += 1;
                    inputs.passed_projects += 1;
                }
                QualityGateStatus::Error => inputs.gated_projects += 1,
                QualityGateStatus::None => {}
            }
            if project.blocker_count() > 0 {
                inputs.projects_with_blockers += 1;
            }

            for branch in &project.branches {
                let metrics = &branch.current_metrics;
                if let Some(coverage) = metrics.number(MetricKey::Coverage).filter(|c| *c > 0.0) {
                    coverage_sum += coverage;
                    inputs.coverage_branches += 1;
                }
                if let Some(dup) = metrics.number(MetricKey::DuplicatedLinesDensity) {
                    duplication_sum += dup;
                    inputs.duplication_branches += 1;
                }
            }
        }

        inputs.qg_pass_rate = ratio(inputs.passed_projects, inputs.gated_projects) * 100.0;
        if inputs.coverage_branches > 0 {
            inputs.avg_coverage = coverage_sum / inputs.coverage_branches as f64;
        }
        if inputs.duplication_branches > 0 {
            inputs.avg_duplication = duplication_sum / inputs.duplication_branches as f64;
        }
        inputs
    }

    /// Points lost for blocker presence, 0 when no project has one
    pub fn blocker_penalty(&self) -> f64 {
        BLOCKER_WEIGHT * ratio(self.projects_with_blockers, self.total_projects)
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Points contributed by each term
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub quality_gate: f64,
    pub coverage: f64,
    pub duplication: f64,
    pub blockers: f64,
}

impl ScoreComponents {
    pub fn total(&self) -> f64 {
        self.quality_gate + self.coverage + self.duplication + self.blockers
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Always within [0, 100]
    pub health_score: f64,
    pub status: StatusBand,
    pub components: ScoreComponents,
    pub inputs: HealthInputs,
}

pub struct HealthScorer<'a> {
    thresholds: &'a Thresholds,
}

impl<'a> HealthScorer<'a> {
    pub fn new(thresholds: &'a Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn calculate(&self, projects: &[ProjectSnapshot]) -> ScoreResult {
        self.score(HealthInputs::from_projects(projects))
    }

    pub fn score(&self, inputs: HealthInputs) -> ScoreResult {
        let components = ScoreComponents {
            quality_gate: QUALITY_GATE_WEIGHT * inputs.qg_pass_rate / 100.0,
            coverage: COVERAGE_WEIGHT * inputs.avg_coverage / 100.0,
            duplication: DUPLICATION_WEIGHT * (100.0 - inputs.avg_duplication) / 100.0,
            blockers: BLOCKER_WEIGHT - inputs.blocker_penalty(),
        };

        let raw = components.total();
        let health_score = if raw.is_finite() { raw.clamp(0.0, 100.0) } else { 0.0 };

        debug!(
            "Health {:.1}: qg={:.1} coverage={:.1} duplication={:.1} blockers={:.1}",
            health_score,
            components.quality_gate,
            components.coverage,
            components.duplication,
            components.blockers
        );

        ScoreResult {
            health_score,
            status: self.thresholds.band(health_score),
            components,
            inputs,
        }
    }

    /// Human-readable breakdown of a score
    pub fn explain(&self, result: &ScoreResult) -> String {
        let i = &result.inputs;
        let c = &result.components;
        let mut lines = Vec::new();

        lines.push(format!(
            "Health score: {:.1} ({})",
            result.health_score, result.status
        ));
        lines.push(format!(
            "  Quality gate  {:>5.1} / 30   {}/{} gated projects passing",
            c.quality_gate, i.passed_projects, i.gated_projects
        ));
        lines.push(format!(
            "  Coverage      {:>5.1} / 25   mean {:.1}% over {} branches",
            c.coverage, i.avg_coverage, i.coverage_branches
        ));
        lines.push(format!(
            "  Duplication   {:>5.1} / 20   mean {:.1}% over {} branches",
            c.duplication, i.avg_duplication, i.duplication_branches
        ));
        lines.push(format!(
            "  Blockers      {:>5.1} / 25   {}/{} projects with blockers",
            c.blockers, i.projects_with_blockers, i.total_projects
        ));

        lines.join("\n")
    }
}
