//! Health and Risk Scoring
//!
//! Turns an assembled run into a composite health figure, ranks branches by
//! risk, and bands percentage-like KPIs.
//!
//! # Health Formula
//!
//! ```text
//! Health = 30 × pass_rate/100
//!        + 25 × avg_coverage/100
//!        + 20 × (100 − avg_duplication)/100
//!        + (25 − 25 × projects_with_blockers / total_projects)
//!
//! clamped to [0, 100]
//! ```
//!
//! - `pass_rate` only counts projects whose main branch has a gate verdict
//! - `avg_coverage` only averages branches reporting coverage > 0
//! - `avg_duplication` only averages branches reporting a duplication value
//!
//! # Branch Risk
//!
//! ```text
//! Risk = ( min(bugs/10, 100) × 2
//!        + min(vulnerabilities/5, 100) × 3
//!        + min(code_smells/100, 100) × 1
//!        + (100 − coverage) × 2
//!        + duplication × 1 ) / 9
//! ```
//!
//! Risk is unbounded and only used to order branches.
//!
//! # Bands
//!
//! Every KPI is banded on a higher-is-better scale with four descending
//! thresholds: excellent, good, warning, danger. Below the last is critical.

mod bands;
mod health_scorer;
mod kpi;
mod risk;

pub use bands::{BandThresholds, StatusBand, Thresholds};
pub use health_scorer::{HealthInputs, HealthScorer, ScoreComponents, ScoreResult};
pub use kpi::{Kpi, KpiReport, RatingLists};
pub use risk::{branch_risk, riskiest_branches, RiskEntry};

/// How many branches the worst-branches ranking shows
pub const WORST_BRANCHES: usize = 10;
