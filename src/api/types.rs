//! Wire types for the SonarQube web API
//!
//! Responses are decoded into these structs at the client boundary. Fields
//! outside the enumerated contract (issue type, severity, hotspot status,
//! quality gate status) are normalised here, so later stages only ever see
//! well-typed values.

use crate::models::{HotspotStatus, IssueType, MetricHistory, QualityGateStatus, Severity};
use serde::Deserialize;

/// `/api/system/status`
#[derive(Debug, Clone, Deserialize)]
pub struct SystemStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Paging envelope shared by listing endpoints
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paging {
    #[serde(default)]
    pub page_index: u64,
    #[serde(default)]
    pub page_size: u64,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectComponent {
    pub key: String,
    #[serde(default)]
    pub name: String,
}

/// `/api/projects/search`
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectsPage {
    #[serde(default)]
    pub paging: Paging,
    #[serde(default)]
    pub components: Vec<ProjectComponent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub name: String,
    #[serde(default)]
    pub is_main: bool,
}

impl Branch {
    /// Stand-in for projects whose branch listing is empty
    pub fn synthesized_main() -> Self {
        Self {
            name: "main".to_string(),
            is_main: true,
        }
    }

    /// Main branch flag, or a conventional main-branch name
    pub fn is_primary(&self) -> bool {
        self.is_main
            || self.name.eq_ignore_ascii_case("main")
            || self.name.eq_ignore_ascii_case("master")
    }
}

/// `/api/project_branches/list`
#[derive(Debug, Clone, Deserialize)]
pub struct BranchList {
    #[serde(default)]
    pub branches: Vec<Branch>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Measure {
    pub metric: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeasureComponent {
    #[serde(default)]
    pub measures: Vec<Measure>,
}

/// `/api/measures/component`
#[derive(Debug, Clone, Deserialize)]
pub struct ComponentMeasures {
    #[serde(default)]
    pub component: MeasureComponent,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectStatus {
    #[serde(default)]
    pub status: Option<String>,
}

/// `/api/qualitygates/project_status`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityGateResponse {
    #[serde(default)]
    pub project_status: ProjectStatus,
}

impl QualityGateResponse {
    pub fn status(&self) -> QualityGateStatus {
        QualityGateStatus::from(self.project_status.status.clone())
    }
}

/// `/api/measures/search_history`
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub measures: Vec<MetricHistory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisEvent {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Analysis {
    pub date: String,
    #[serde(default)]
    pub events: Vec<AnalysisEvent>,
}

impl Analysis {
    /// Name of the first quality-gate event, if the analysis recorded one
    pub fn quality_gate_event(&self) -> Option<&AnalysisEvent> {
        self.events
            .iter()
            .find(|e| e.category.as_deref() == Some("QUALITY_GATE"))
    }
}

/// `/api/project_analyses/search`
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysesResponse {
    #[serde(default)]
    pub analyses: Vec<Analysis>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireIssue {
    #[serde(default)]
    key: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    component: String,
    #[serde(default)]
    line: Option<i64>,
    #[serde(default, rename = "type")]
    issue_type: IssueType,
    #[serde(default)]
    severity: Severity,
    #[serde(default)]
    rule: Option<String>,
    #[serde(default)]
    creation_date: Option<String>,
}

/// Placeholder for issues reported without a message
pub const NO_MESSAGE: &str = "(no description)";

/// A validated, unresolved issue
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub key: String,
    pub message: String,
    pub component: String,
    pub line: Option<u32>,
    pub issue_type: IssueType,
    pub severity: Severity,
    /// Rule id, `UNKNOWN` when absent
    pub rule: String,
    pub creation_date: Option<String>,
}

impl<'de> Deserialize<'de> for Issue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        WireIssue::deserialize(deserializer).map(Issue::from_wire)
    }
}

impl Issue {
    fn from_wire(w: WireIssue) -> Self {
        Self {
            key: w.key,
            message: w
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| NO_MESSAGE.to_string()),
            component: w.component,
            line: w.line.and_then(|l| u32::try_from(l).ok()),
            issue_type: w.issue_type,
            severity: w.severity,
            rule: w
                .rule
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| "UNKNOWN".to_string()),
            creation_date: w.creation_date.filter(|d| !d.is_empty()),
        }
    }
}

/// `/api/issues/search`
///
/// Older servers report `total` at the top level, newer ones in `paging`.
#[derive(Debug, Clone, Deserialize)]
pub struct IssuesPage {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub paging: Option<Paging>,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

impl IssuesPage {
    pub fn total(&self) -> u64 {
        self.total
            .or(self.paging.map(|p| p.total))
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Hotspot {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub status: HotspotStatus,
}

/// `/api/hotspots/search`
#[derive(Debug, Clone, Deserialize)]
pub struct HotspotsPage {
    #[serde(default)]
    pub paging: Paging,
    #[serde(default)]
    pub hotspots: Vec<Hotspot>,
}
