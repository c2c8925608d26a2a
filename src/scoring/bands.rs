//! Status banding for percentage-like metrics

use serde::{Deserialize, Serialize};
use std::fmt;

/// Five ordinal labels, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusBand {
    Excellent,
    Good,
    Warning,
    Danger,
    Critical,
}

impl StatusBand {
    pub fn label(&self) -> &'static str {
        match self {
            StatusBand::Excellent => "EXCELLENT",
            StatusBand::Good => "GOOD",
            StatusBand::Warning => "WARNING",
            StatusBand::Danger => "DANGER",
            StatusBand::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for StatusBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Four descending cut-offs: excellent, good, warning, danger.
/// Anything below the last is critical.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Thresholds(pub [f64; 4]);

impl Thresholds {
    pub const fn new(excellent: f64, good: f64, warning: f64, danger: f64) -> Self {
        Self([excellent, good, warning, danger])
    }

    /// Strictly descending and finite
    pub fn is_valid(&self) -> bool {
        self.0.iter().all(|t| t.is_finite()) && self.0.windows(2).all(|w| w[0] > w[1])
    }

    pub fn band(&self, value: f64) -> StatusBand {
        let [excellent, good, warning, danger] = self.0;
        match value {
            v if v >= excellent => StatusBand::Excellent,
            v if v >= good => StatusBand::Good,
            v if v >= warning => StatusBand::Warning,
            v if v >= danger => StatusBand::Danger,
            _ => StatusBand::Critical,
        }
    }
}

/// Per-metric thresholds. Every metric is banded on a higher-is-better scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandThresholds {
    pub health: Thresholds,
    pub quality_gate: Thresholds,
    pub coverage: Thresholds,
    /// Applied to `100 - duplication`
    pub duplication: Thresholds,
    /// Applied to `100 - min(bugs_per_kloc * 10, 100)`
    pub bugs: Thresholds,
    /// Applied to `100 - min(vulnerabilities_per_kloc * 20, 100)`
    pub vulnerabilities: Thresholds,
}

impl Default for BandThresholds {
    fn default() -> Self {
        Self {
            health: Thresholds::new(90.0, 75.0, 60.0, 40.0),
            quality_gate: Thresholds::new(80.0, 60.0, 40.0, 20.0),
            coverage: Thresholds::new(80.0, 70.0, 50.0, 30.0),
            duplication: Thresholds::new(95.0, 90.0, 80.0, 70.0),
            bugs: Thresholds::new(80.0, 60.0, 40.0, 20.0),
            vulnerabilities: Thresholds::new(80.0, 60.0, 40.0, 20.0),
        }
    }
}

impl BandThresholds {
    /// Replace invalid tables with their defaults, naming the ones replaced
    pub fn sanitized(mut self) -> (Self, Vec<&'static str>) {
        let defaults = Self::default();
        let mut replaced = Vec::new();
        let fields: [(&'static str, &mut Thresholds, Thresholds); 6] = [
            ("health", &mut self.health, defaults.health),
            ("quality_gate", &mut self.quality_gate, defaults.quality_gate),
            ("coverage", &mut self.coverage, defaults.coverage),
            ("duplication", &mut self.duplication, defaults.duplication),
            ("bugs", &mut self.bugs, defaults.bugs),
            ("vulnerabilities", &mut self.vulnerabilities, defaults.vulnerabilities),
        ];
        for (name, current, default) in fields {
            if !current.is_valid() {
                *current = default;
                replaced.push(name);
            }
        }
        (self, replaced)
    }
}
