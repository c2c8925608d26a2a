//! Per-branch risk score and worst-branch ranking

use crate::models::{MetricKey, MetricSnapshot, RunSnapshot};
use serde::{Deserialize, Serialize};

/// Weighted sum over 9, unbounded above. Only meaningful for ranking.
pub fn branch_risk(metrics: &MetricSnapshot) -> f64 {
    let bugs = metrics.value_or_zero(MetricKey::Bugs);
    let vulnerabilities = metrics.value_or_zero(MetricKey::Vulnerabilities);
    let code_smells = metrics.value_or_zero(MetricKey::CodeSmells);
    let coverage = metrics.value_or_zero(MetricKey::Coverage);
    let duplication = metrics.value_or_zero(MetricKey::DuplicatedLinesDensity);

    ((bugs / 10.0).min(100.0) * 2.0
        + (vulnerabilities / 5.0).min(100.0) * 3.0
        + (code_smells / 100.0).min(100.0)
        + (100.0 - coverage) * 2.0
        + duplication)
        / 9.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskEntry {
    pub project: String,
    pub branch: String,
    pub risk_score: f64,
    pub bugs: f64,
    pub vulnerabilities: f64,
    pub coverage: f64,
}

/// The `limit` highest-risk branches, worst first. Ties keep snapshot order.
pub fn riskiest_branches(snapshot: &RunSnapshot, limit: usize) -> Vec<RiskEntry> {
    let mut entries: Vec<RiskEntry> = snapshot
        .branches()
        .map(|(project, branch)| {
            let m = &branch.current_metrics;
            RiskEntry {
                project: project.name.clone(),
                branch: branch.name.clone(),
                risk_score: branch_risk(m),
                bugs: m.value_or_zero(MetricKey::Bugs),
                vulnerabilities: m.value_or_zero(MetricKey::Vulnerabilities),
                coverage: m.value_or_zero(MetricKey::Coverage),
            }
        })
        .collect();

    entries.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));
    entries.truncate(limit);
    entries
}
