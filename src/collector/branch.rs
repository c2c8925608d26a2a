//! Per-branch collection
//!
//! Seven steps in fixed order, each isolated: a failure substitutes the
//! step's empty default and records a diagnostic, unless its disposition
//! drops the branch.

use super::outcome::{CollectError, StepContext};
use super::run::CollectOptions;
use crate::aggregate::{aggregate, parse_timestamp};
use crate::api::types::{AnalysesResponse, Branch};
use crate::api::{ApiError, ApiResult, SonarClient};
use crate::models::{BranchSnapshot, MttrData, QualityGateEvent, QualityGateStatus, Step};
use crate::pagination::{paginate, Paginated, StopReason};
use crate::scoring::branch_risk;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, info, warn};

const COVERAGE_METRICS: &str = "coverage";
const DEFECT_METRICS: &str = "bugs,vulnerabilities";

/// A collected branch, or the reason it was dropped
#[derive(Debug, Clone)]
pub struct BranchOutcome {
    /// `None` when the branch was dropped
    pub snapshot: Option<BranchSnapshot>,
    pub errors: Vec<CollectError>,
}

impl BranchOutcome {
    pub fn is_dropped(&self) -> bool {
        self.snapshot.is_none()
    }
}

/// Failures seen while collecting one branch
struct StepLog<'a> {
    project: &'a str,
    branch: &'a str,
    errors: Vec<CollectError>,
}

impl<'a> StepLog<'a> {
    /// Record a failure. `None` means the branch must be dropped.
    fn record(&mut self, step: Step, error: ApiError) -> Option<()> {
        let err = CollectError::classify(StepContext::branch(self.project, self.branch, step), error);
        warn!("{}", err);
        let dropped = err.drops_unit();
        self.errors.push(err);
        if dropped {
            None
        } else {
            Some(())
        }
    }

    fn settle<T: Default>(&mut self, step: Step, result: ApiResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => self.record(step, e).map(|_| T::default()),
        }
    }

    /// Keep whatever a listing accumulated, even when a page failed
    fn settle_paged<T>(&mut self, step: Step, listing: Paginated<T>) -> Option<Vec<T>> {
        if listing.stop == StopReason::Ceiling {
            debug!(
                "{} [{}] {}: page ceiling hit, kept {} of {}",
                self.project,
                self.branch,
                step,
                listing.items.len(),
                listing.reported_total
            );
        }
        if let Some(e) = listing.error {
            self.record(step, e)?;
        }
        Some(listing.items)
    }
}

pub struct BranchCollector<'a> {
    client: &'a SonarClient,
    options: &'a CollectOptions,
    now: DateTime<Utc>,
}

impl<'a> BranchCollector<'a> {
    pub fn new(client: &'a SonarClient, options: &'a CollectOptions, now: DateTime<Utc>) -> Self {
        Self {
            client,
            options,
            now,
        }
    }

    fn window_start(&self, days: i64) -> DateTime<Utc> {
        self.now - Duration::days(days)
    }

    fn since(&self, days: i64) -> NaiveDate {
        self.window_start(days).date_naive()
    }

    pub fn collect(&self, project: &str, branch: &Branch) -> BranchOutcome {
        let mut log = StepLog {
            project,
            branch: &branch.name,
            errors: Vec::new(),
        };
        let snapshot = self.collect_steps(project, branch, &mut log);
        if snapshot.is_none() {
            warn!("{} [{}]: branch dropped", project, branch.name);
        }
        BranchOutcome {
            snapshot,
            errors: log.errors,
        }
    }

    fn collect_steps(
        &self,
        project: &str,
        branch: &Branch,
        log: &mut StepLog<'_>,
    ) -> Option<BranchSnapshot> {
        let name = Some(branch.name.as_str());
        let opts = self.options;

        let current_metrics = log.settle(Step::Metrics, self.client.current_metrics(project, name))?;

        let qg_status = if branch.is_primary() {
            log.settle(
                Step::QualityGate,
                self.client.quality_gate_status(project, name),
            )?
        } else {
            QualityGateStatus::None
        };

        let coverage_history = log.settle(
            Step::CoverageHistory,
            self.client.metric_history(
                project,
                COVERAGE_METRICS,
                self.since(opts.coverage_history_days),
                name,
                opts.history_page_size,
            ),
        )?;

        let bugs_history = log.settle(
            Step::DefectHistory,
            self.client.metric_history(
                project,
                DEFECT_METRICS,
                self.since(opts.defect_history_days),
                name,
                opts.history_page_size,
            ),
        )?;

        let qg_history = log
            .settle(
                Step::QualityGateHistory,
                self.client
                    .analyses(project, name, opts.analyses_page_size)
                    .map(Some),
            )?
            .map(|r| {
                quality_gate_history(&r, self.window_start(opts.quality_gate_history_days))
            })
            .unwrap_or_default();

        let issues = log.settle_paged(
            Step::Issues,
            paginate(opts.issue_limits, |page, size| {
                self.client.issues_page(project, name, page, size)
            }),
        )?;

        let hotspots = log.settle_paged(
            Step::Hotspots,
            paginate(opts.hotspot_limits, |page, size| {
                self.client.hotspots_page(project, name, page, size)
            }),
        )?;

        let agg = aggregate(&issues, &hotspots);
        if !agg.blockers.is_empty() {
            info!(
                "{} [{}]: {} blocker issues",
                project,
                branch.name,
                agg.blockers.len()
            );
        }
        debug!(
            "{} [{}]: {} issues, {} hotspots",
            project, branch.name, agg.total_issues, agg.total_hotspots
        );

        let risk_score = branch_risk(&current_metrics);
        Some(BranchSnapshot {
            name: branch.name.clone(),
            is_main: branch.is_main,
            qg_status,
            current_metrics,
            coverage_history,
            bugs_history,
            qg_history,
            issues: agg.issues,
            hotspots: agg.hotspots,
            blocker_issues: agg.blockers,
            mttr_data: MttrData::default(),
            total_issues: agg.total_issues,
            total_hotspots: agg.total_hotspots,
            risk_score,
        })
    }
}

/// Gate verdicts recorded since `cutoff`. Analyses without a gate event or
/// with an unreadable date are skipped.
pub fn quality_gate_history(
    response: &AnalysesResponse,
    cutoff: DateTime<Utc>,
) -> Vec<QualityGateEvent> {
    response
        .analyses
        .iter()
        .filter(|a| {
            parse_timestamp(&a.date)
                .map(|ts| ts.with_timezone(&Utc) >= cutoff)
                .unwrap_or(false)
        })
        .filter_map(|a| {
            let event = a.quality_gate_event()?;
            Some(QualityGateEvent {
                date: a.date.clone(),
                status: event.name.clone().unwrap_or_else(|| "UNKNOWN".to_string()),
            })
        })
        .collect()
}
