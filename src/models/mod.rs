//! Snapshot data model
//!
//! One [`RunSnapshot`] per collection run: run metadata → projects →
//! branches → per-branch metrics and aggregates. The serialised field names
//! are read verbatim by the dashboard renderer and must not change.

mod counts;
mod metrics;

pub use counts::{CountKey, HotspotStatus, IssueType, Severity, Tally};
pub use metrics::{MetricKey, MetricSnapshot, MetricValue};

use crate::scoring::ScoreResult;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality gate verdict for a branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "&'static str")]
pub enum QualityGateStatus {
    Ok,
    Error,
    /// No gate configured, not queried, or not reported
    #[default]
    None,
}

impl QualityGateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QualityGateStatus::Ok => "OK",
            QualityGateStatus::Error => "ERROR",
            QualityGateStatus::None => "NONE",
        }
    }
}

impl From<Option<String>> for QualityGateStatus {
    fn from(value: Option<String>) -> Self {
        match value.as_deref() {
            Some("OK") => QualityGateStatus::Ok,
            Some("ERROR") => QualityGateStatus::Error,
            _ => QualityGateStatus::None,
        }
    }
}

impl From<QualityGateStatus> for &'static str {
    fn from(status: QualityGateStatus) -> Self {
        status.as_str()
    }
}

impl fmt::Display for QualityGateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One point of a metric history series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// History series for one metric, as returned by `search_history`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricHistory {
    pub metric: String,
    #[serde(default)]
    pub history: Vec<HistoryPoint>,
}

/// Quality-gate verdict recorded by one analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityGateEvent {
    pub date: String,
    pub status: String,
}

/// New bugs / vulnerabilities created in one ISO week
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekCounts {
    pub bugs: u64,
    pub vulnerabilities: u64,
}

/// Issue counts for one branch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueAggregate {
    #[serde(rename = "issues_by_type")]
    pub by_type: Tally<IssueType>,
    #[serde(rename = "issues_by_severity")]
    pub by_severity: Tally<Severity>,
    /// Rule id → count, in first-seen order
    #[serde(rename = "rules_count")]
    pub by_rule: IndexMap<String, u64>,
    /// `YYYY-Www` → counts, in first-seen order
    #[serde(rename = "issues_by_date")]
    pub by_week: IndexMap<String, WeekCounts>,
}

/// Hotspot counts for one branch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HotspotAggregate {
    #[serde(rename = "hotspots_by_status")]
    pub by_status: Tally<HotspotStatus>,
}

/// A BLOCKER issue kept verbatim for the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockerRecord {
    pub key: String,
    pub message: String,
    /// Project-relative path
    pub component: String,
    pub line: Option<u32>,
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub rule: String,
    #[serde(rename = "creationDate")]
    pub creation_date: String,
}

/// Mean-time-to-repair placeholder kept for the renderer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MttrData {
    pub bugs: u64,
    pub vulnerabilities: u64,
    pub code_smells: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchSnapshot {
    pub name: String,
    pub is_main: bool,
    pub qg_status: QualityGateStatus,
    pub current_metrics: MetricSnapshot,
    pub coverage_history: Vec<MetricHistory>,
    pub bugs_history: Vec<MetricHistory>,
    pub qg_history: Vec<QualityGateEvent>,
    #[serde(flatten)]
    pub issues: IssueAggregate,
    #[serde(flatten)]
    pub hotspots: HotspotAggregate,
    pub blocker_issues: Vec<BlockerRecord>,
    #[serde(default)]
    pub mttr_data: MttrData,
    pub total_issues: u64,
    pub total_hotspots: u64,
    #[serde(default)]
    pub risk_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub key: String,
    pub name: String,
    pub main_qg_status: QualityGateStatus,
    pub branches: Vec<BranchSnapshot>,
}

impl ProjectSnapshot {
    pub fn blocker_count(&self) -> usize {
        self.branches.iter().map(|b| b.blocker_issues.len()).sum()
    }
}

/// Collection step a diagnostic refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Preflight,
    Projects,
    Branches,
    Metrics,
    QualityGate,
    CoverageHistory,
    DefectHistory,
    QualityGateHistory,
    Issues,
    Hotspots,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::Preflight => "pre-flight check",
            Step::Projects => "project listing",
            Step::Branches => "branch listing",
            Step::Metrics => "current metrics",
            Step::QualityGate => "quality gate status",
            Step::CoverageHistory => "coverage history",
            Step::DefectHistory => "bugs/vulnerabilities history",
            Step::QualityGateHistory => "quality gate history",
            Step::Issues => "issue listing",
            Step::Hotspots => "hotspot listing",
        };
        f.write_str(s)
    }
}

/// Something that went wrong but did not abort the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub step: Step,
    /// True when the whole branch was dropped
    #[serde(default)]
    pub dropped: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub collection_date: DateTime<Utc>,
    pub sonar_url: String,
    pub total_projects: usize,
    pub projects_main_passed: usize,
    pub projects_main_failed: usize,
    pub projects_main_none: usize,
    pub projects: Vec<ProjectSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<ScoreResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl RunSnapshot {
    pub fn branch_count(&self) -> usize {
        self.projects.iter().map(|p| p.branches.len()).sum()
    }

    pub fn blocker_count(&self) -> usize {
        self.projects.iter().map(|p| p.blocker_count()).sum()
    }

    /// Every (project, branch) pair in snapshot order
    pub fn branches(&self) -> impl Iterator<Item = (&ProjectSnapshot, &BranchSnapshot)> {
        self.projects
            .iter()
            .flat_map(|p| p.branches.iter().map(move |b| (p, b)))
    }
}
