//! Run-wide KPI rollup for the summary view

use super::bands::{BandThresholds, StatusBand};
use super::health_scorer::ScoreResult;
use crate::models::{MetricKey, RunSnapshot, Severity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
    pub value: f64,
    pub band: StatusBand,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingLists {
    pub reliability: Vec<String>,
    pub security: Vec<String>,
    pub maintainability: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiReport {
    pub total_projects: usize,
    pub total_branches: usize,
    pub health: Kpi,
    pub qg_pass_rate: Kpi,
    pub coverage: Kpi,
    /// Mean duplication; banded on `100 - value`
    pub duplication: Kpi,
    pub bugs_per_kloc: Kpi,
    pub vulnerabilities_per_kloc: Kpi,
    pub total_bugs: f64,
    pub total_vulnerabilities: f64,
    pub total_code_smells: f64,
    pub total_ncloc: f64,
    pub total_hotspots: u64,
    pub blocker_issues: usize,
    /// Branches with at least one CRITICAL issue
    pub branches_with_critical: usize,
    pub ratings: RatingLists,
}

fn per_kloc(count: f64, ncloc: f64) -> f64 {
    if ncloc > 0.0 {
        count / (ncloc / 1000.0)
    } else {
        0.0
    }
}

impl KpiReport {
    pub fn compute(snapshot: &RunSnapshot, score: &ScoreResult, thresholds: &BandThresholds) -> Self {
        let mut total_bugs = 0.0;
        let mut total_vulnerabilities = 0.0;
        let mut total_code_smells = 0.0;
        let mut total_ncloc = 0.0;
        let mut total_hotspots = 0;
        let mut branches_with_critical = 0;
        let mut ratings = RatingLists::default();

        for (_, branch) in snapshot.branches() {
            let m = &branch.current_metrics;
            total_bugs += m.value_or_zero(MetricKey::Bugs);
            total_vulnerabilities += m.value_or_zero(MetricKey::Vulnerabilities);
            total_code_smells += m.value_or_zero(MetricKey::CodeSmells);
            total_ncloc += m.value_or_zero(MetricKey::Ncloc);
            total_hotspots += branch.total_hotspots;

            if branch.issues.by_severity.get(Severity::Critical) > 0 {
                branches_with_critical += 1;
            }
            let lists = [
                (MetricKey::ReliabilityRating, &mut ratings.reliability),
                (MetricKey::SecurityRating, &mut ratings.security),
                (MetricKey::SqaleRating, &mut ratings.maintainability),
            ];
            for (key, list) in lists {
                if let Some(r) = m.rating(key) {
                    list.push(r.to_string());
                }
            }
        }

        let inputs = &score.inputs;
        let bugs_per_kloc = per_kloc(total_bugs, total_ncloc);
        let vulns_per_kloc = per_kloc(total_vulnerabilities, total_ncloc);

        KpiReport {
            total_projects: snapshot.projects.len(),
            total_branches: snapshot.branch_count(),
            health: Kpi {
                value: score.health_score,
                band: thresholds.health.band(score.health_score),
            },
            qg_pass_rate: Kpi {
                value: inputs.qg_pass_rate,
                band: thresholds.quality_gate.band(inputs.qg_pass_rate),
            },
            coverage: Kpi {
                value: inputs.avg_coverage,
                band: thresholds.coverage.band(inputs.avg_coverage),
            },
            duplication: Kpi {
                value: inputs.avg_duplication,
                band: thresholds.duplication.band(100.0 - inputs.avg_duplication),
            },
            bugs_per_kloc: Kpi {
                value: bugs_per_kloc,
                band: thresholds.bugs.band(100.0 - (bugs_per_kloc * 10.0).min(100.0)),
            },
            vulnerabilities_per_kloc: Kpi {
                value: vulns_per_kloc,
                band: thresholds
                    .vulnerabilities
                    .band(100.0 - (vulns_per_kloc * 20.0).min(100.0)),
            },
            total_bugs,
            total_vulnerabilities,
            total_code_smells,
            total_ncloc,
            total_hotspots,
            blocker_issues: snapshot.blocker_count(),
            branches_with_critical,
            ratings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BranchSnapshot, MetricSnapshot, MttrData, ProjectSnapshot, QualityGateStatus};
    use crate::scoring::HealthScorer;
    use chrono::Utc;

    fn snapshot(metrics: &[(&str, &str)], critical: u64) -> RunSnapshot {
        let mut current_metrics = MetricSnapshot::new();
        for (k, v) in metrics {
            current_metrics.insert_raw(k, v);
        }
        let mut branch = BranchSnapshot {
            name: "main".to_string(),
            is_main: true,
            qg_status: QualityGateStatus::Ok,
            current_metrics,
            coverage_history: Vec::new(),
            bugs_history: Vec::new(),
            qg_history: Vec::new(),
            issues: Default::default(),
            hotspots: Default::default(),
            blocker_issues: Vec::new(),
            mttr_data: MttrData::default(),
            total_issues: critical,
            total_hotspots: 4,
            risk_score: 0.0,
        };
        branch.issues.by_severity.add(Severity::Critical, critical);
        RunSnapshot {
            collection_date: Utc::now(),
            sonar_url: "https://sonar.example.com".to_string(),
            total_projects: 1,
            projects_main_passed: 1,
            projects_main_failed: 0,
            projects_main_none: 0,
            projects: vec![ProjectSnapshot {
                key: "p".to_string(),
                name: "P".to_string(),
                main_qg_status: QualityGateStatus::Ok,
                branches: vec![branch],
            }],
            health: None,
            diagnostics: Vec::new(),
        }
    }

    #[test]
    fn test_density_bands() {
        let snap = snapshot(
            &[
                ("bugs", "10"),
                ("vulnerabilities", "1"),
                ("ncloc", "2000"),
                ("security_rating", "1.0"),
            ],
            2,
        );
        let thresholds = BandThresholds::default();
        let score = HealthScorer::new(&thresholds.health).calculate(&snap.projects);
        let kpi = KpiReport::compute(&snap, &score, &thresholds);

        assert!((kpi.bugs_per_kloc.value - 5.0).abs() < 1e-9);
        // 100 - 50 = 50
        assert_eq!(kpi.bugs_per_kloc.band, StatusBand::Warning);
        assert!((kpi.vulnerabilities_per_kloc.value - 0.5).abs() < 1e-9);
        // 100 - 10 = 90
        assert_eq!(kpi.vulnerabilities_per_kloc.band, StatusBand::Excellent);
        assert_eq!(kpi.qg_pass_rate.band, StatusBand::Excellent);
        assert_eq!(kpi.branches_with_critical, 1);
        assert_eq!(kpi.total_hotspots, 4);
        assert_eq!(kpi.ratings.security, vec!["1.0".to_string()]);
        assert!(kpi.ratings.reliability.is_empty());
    }

    #[test]
    fn test_no_code_means_no_density() {
        let snap = snapshot(&[("bugs", "3")], 0);
        let thresholds = BandThresholds::default();
        let score = HealthScorer::new(&thresholds.health).calculate(&snap.projects);
        let kpi = KpiReport::compute(&snap, &score, &thresholds);
        assert_eq!(kpi.bugs_per_kloc.value, 0.0);
        assert_eq!(kpi.bugs_per_kloc.band, StatusBand::Excellent);
        assert_eq!(kpi.branches_with_critical, 0);
    }
}
