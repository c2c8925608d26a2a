//! Folds a branch's raw issue and hotspot lists into report counts
//!
//! Pure and deterministic: the same input lists always produce the same
//! aggregates, including the first-seen order of rule ids and week keys.

use crate::api::types::{Hotspot, Issue};
use crate::models::{
    BlockerRecord, HotspotAggregate, IssueAggregate, IssueType, Severity, WeekCounts,
};
use chrono::{DateTime, Datelike, FixedOffset};

/// Everything derived from one branch's issues and hotspots
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BranchAggregates {
    pub issues: IssueAggregate,
    pub hotspots: HotspotAggregate,
    pub blockers: Vec<BlockerRecord>,
    pub total_issues: u64,
    pub total_hotspots: u64,
}

/// Parse a server timestamp. A trailing `Z` is read as `+00:00`; offsets
/// with or without a colon are accepted.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    let normalized = match raw.strip_suffix('Z') {
        Some(prefix) => format!("{prefix}+00:00"),
        None => raw.to_string(),
    };
    DateTime::parse_from_rfc3339(&normalized)
        .or_else(|_| DateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
}

/// ISO-8601 `YYYY-Www` bucket in the timestamp's own offset
pub fn week_key(raw: &str) -> Option<String> {
    let ts = parse_timestamp(raw)?;
    let week = ts.iso_week();
    Some(format!("{}-W{:02}", week.year(), week.week()))
}

/// Strip a `projectKey:` prefix from a component key
pub fn component_path(component: &str) -> &str {
    match component.rfind(':') {
        Some(idx) => &component[idx + 1..],
        None => component,
    }
}

fn blocker_record(issue: &Issue) -> BlockerRecord {
    BlockerRecord {
        key: issue.key.clone(),
        message: issue.message.clone(),
        component: component_path(&issue.component).to_string(),
        line: issue.line,
        issue_type: issue.issue_type,
        rule: issue.rule.clone(),
        creation_date: issue.creation_date.clone().unwrap_or_default(),
    }
}

pub fn aggregate_issues(issues: &[Issue]) -> (IssueAggregate, Vec<BlockerRecord>) {
    let mut agg = IssueAggregate::default();
    let mut blockers = Vec::new();

    for issue in issues {
        agg.by_type.increment(issue.issue_type);
        agg.by_severity.increment(issue.severity);
        *agg.by_rule.entry(issue.rule.clone()).or_insert(0) += 1;

        if issue.severity == Severity::Blocker {
            blockers.push(blocker_record(issue));
        }

        if !matches!(issue.issue_type, IssueType::Bug | IssueType::Vulnerability) {
            continue;
        }
        let Some(week) = issue.creation_date.as_deref().and_then(week_key) else {
            continue;
        };
        let bucket = agg.by_week.entry(week).or_default();
        if issue.issue_type == IssueType::Bug {
            bucket.bugs += 1;
        } else {
            bucket.vulnerabilities += 1;
        }
    }

    (agg, blockers)
}

pub fn aggregate_hotspots(hotspots: &[Hotspot]) -> HotspotAggregate {
    let mut agg = HotspotAggregate::default();
    for hotspot in hotspots {
        agg.by_status.increment(hotspot.status);
    }
    agg
}

pub fn aggregate(issues: &[Issue], hotspots: &[Hotspot]) -> BranchAggregates {
    let (issue_agg, blockers) = aggregate_issues(issues);
    BranchAggregates {
        issues: issue_agg,
        hotspots: aggregate_hotspots(hotspots),
        blockers,
        total_issues: issues.len() as u64,
        total_hotspots: hotspots.len() as u64,
    }
}
