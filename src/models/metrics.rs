//! Current-value metric snapshot for one branch

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// The fixed set of metric keys requested for every branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    Coverage,
    Bugs,
    Vulnerabilities,
    CodeSmells,
    DuplicatedLinesDensity,
    Ncloc,
    SecurityHotspots,
    /// Technical debt index, in minutes
    SqaleIndex,
    ReliabilityRating,
    SecurityRating,
    SqaleRating,
    BlockerViolations,
    CriticalViolations,
    MajorViolations,
    MinorViolations,
    InfoViolations,
    NewBugs,
    NewVulnerabilities,
    NewCodeSmells,
}

impl MetricKey {
    pub const ALL: [MetricKey; 19] = [
        MetricKey::Coverage,
        MetricKey::Bugs,
        MetricKey::Vulnerabilities,
        MetricKey::CodeSmells,
        MetricKey::DuplicatedLinesDensity,
        MetricKey::Ncloc,
        MetricKey::SecurityHotspots,
        MetricKey::SqaleIndex,
        MetricKey::ReliabilityRating,
        MetricKey::SecurityRating,
        MetricKey::SqaleRating,
        MetricKey::BlockerViolations,
        MetricKey::CriticalViolations,
        MetricKey::MajorViolations,
        MetricKey::MinorViolations,
        MetricKey::InfoViolations,
        MetricKey::NewBugs,
        MetricKey::NewVulnerabilities,
        MetricKey::NewCodeSmells,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKey::Coverage => "coverage",
            MetricKey::Bugs => "bugs",
            MetricKey::Vulnerabilities => "vulnerabilities",
            MetricKey::CodeSmells => "code_smells",
            MetricKey::DuplicatedLinesDensity => "duplicated_lines_density",
            MetricKey::Ncloc => "ncloc",
            MetricKey::SecurityHotspots => "security_hotspots",
            MetricKey::SqaleIndex => "sqale_index",
            MetricKey::ReliabilityRating => "reliability_rating",
            MetricKey::SecurityRating => "security_rating",
            MetricKey::SqaleRating => "sqale_rating",
            MetricKey::BlockerViolations => "blocker_violations",
            MetricKey::CriticalViolations => "critical_violations",
            MetricKey::MajorViolations => "major_violations",
            MetricKey::MinorViolations => "minor_violations",
            MetricKey::InfoViolations => "info_violations",
            MetricKey::NewBugs => "new_bugs",
            MetricKey::NewVulnerabilities => "new_vulnerabilities",
            MetricKey::NewCodeSmells => "new_code_smells",
        }
    }

    pub fn parse(key: &str) -> Option<MetricKey> {
        Self::ALL.iter().copied().find(|k| k.as_str() == key)
    }

    /// Ratings are ordinal letter grades and stay opaque strings
    pub fn is_rating(self) -> bool {
        matches!(
            self,
            MetricKey::ReliabilityRating | MetricKey::SecurityRating | MetricKey::SqaleRating
        )
    }

    /// Comma-separated list for the `metricKeys` parameter
    pub fn request_list() -> String {
        Self::ALL
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Rating(String),
}

/// Metric key → value for one branch. Keys the server did not report are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSnapshot(BTreeMap<MetricKey, MetricValue>);

impl MetricSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raw wire value, normalising it to the key's type.
    ///
    /// Unknown keys and non-numeric values for numeric keys are dropped.
    pub fn insert_raw(&mut self, metric: &str, value: &str) {
        let Some(key) = MetricKey::parse(metric) else {
            debug!("Ignoring unrequested metric {}", metric);
            return;
        };
        if key.is_rating() {
            self.0.insert(key, MetricValue::Rating(value.to_string()));
            return;
        }
        match value.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => {
                self.0.insert(key, MetricValue::Number(n));
            }
            _ => debug!("Dropping non-numeric value {:?} for {}", value, metric),
        }
    }

    pub fn set(&mut self, key: MetricKey, value: MetricValue) {
        self.0.insert(key, value);
    }

    pub fn get(&self, key: MetricKey) -> Option<&MetricValue> {
        self.0.get(&key)
    }

    /// Numeric value, if reported
    pub fn number(&self, key: MetricKey) -> Option<f64> {
        match self.0.get(&key) {
            Some(MetricValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// Numeric value, zero when absent
    pub fn value_or_zero(&self, key: MetricKey) -> f64 {
        self.number(key).unwrap_or(0.0)
    }

    pub fn rating(&self, key: MetricKey) -> Option<&str> {
        match self.0.get(&key) {
            Some(MetricValue::Rating(r)) => Some(r.as_str()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}
