//! Run orchestration: pre-flight, enumeration, parallel branch collection
//! and the merge barrier.

use super::branch::BranchCollector;
use super::enumerator::Enumerator;
use super::outcome::{CollectError, RunError, StepContext};
use crate::api::types::{Branch, ProjectComponent};
use crate::api::SonarClient;
use crate::models::{BranchSnapshot, ProjectSnapshot, QualityGateStatus, RunSnapshot, Step};
use crate::pagination::PageLimits;
use crate::scoring::Thresholds;
use crate::snapshot::SnapshotAssembler;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Progress callback: (project name, projects finished, projects total)
pub type ProgressCallback = Box<dyn Fn(&str, usize, usize) + Send + Sync>;

/// Tunables for one collection run
#[derive(Debug, Clone, PartialEq)]
pub struct CollectOptions {
    /// Concurrent branch collections
    pub workers: usize,
    pub project_limits: PageLimits,
    pub issue_limits: PageLimits,
    pub hotspot_limits: PageLimits,
    pub history_page_size: u64,
    pub analyses_page_size: u64,
    pub coverage_history_days: i64,
    pub defect_history_days: i64,
    pub quality_gate_history_days: i64,
    pub health_thresholds: Thresholds,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            project_limits: PageLimits::new(500, 200),
            issue_limits: PageLimits::new(500, 10),
            hotspot_limits: PageLimits::new(500, 20),
            history_page_size: 1000,
            analyses_page_size: 100,
            coverage_history_days: 90,
            defect_history_days: 30,
            quality_gate_history_days: 30,
            health_thresholds: Thresholds::new(90.0, 75.0, 60.0, 40.0),
        }
    }
}

/// One project after all of its branch tasks finished
struct ProjectResult {
    project: ProjectSnapshot,
    errors: Vec<CollectError>,
}

pub struct Collector<'a> {
    client: &'a SonarClient,
    options: CollectOptions,
    now: DateTime<Utc>,
    cancel: Arc<AtomicBool>,
    progress_callback: Option<ProgressCallback>,
}

impl<'a> Collector<'a> {
    pub fn new(client: &'a SonarClient, options: CollectOptions) -> Self {
        Self {
            client,
            options,
            now: Utc::now(),
            cancel: Arc::new(AtomicBool::new(false)),
            progress_callback: None,
        }
    }

    /// Fix the run timestamp (history windows are computed from it)
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Share a flag that stops scheduling new work once set
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub fn run(&self) -> Result<RunSnapshot, RunError> {
        let report = self.client.preflight().map_err(|e| {
            RunError::Preflight(CollectError::classify(StepContext::run(Step::Preflight), e))
        })?;
        info!(
            "Connected to {} (status {}, version {}), {} projects visible",
            self.client.base_url(),
            report.status,
            report.version.as_deref().unwrap_or("unknown"),
            report.visible_projects
        );

        let enumerator = Enumerator::new(self.client, self.options.project_limits);
        let listing = enumerator.projects();
        if listing.items.is_empty() {
            return Err(RunError::NoProjects {
                listing: listing.errors.into_iter().next(),
            });
        }

        let mut assembler = SnapshotAssembler::new(self.client.base_url(), self.now);
        assembler.set_total_projects(listing.items.len());
        for err in &listing.errors {
            assembler.record(err);
        }

        let results = self.collect_projects(&enumerator, &listing.items)?;

        // Merge barrier: every project's branch tasks are done
        for result in results.into_iter().flatten() {
            for err in &result.errors {
                assembler.record(err);
            }
            assembler.merge_project(result.project);
        }

        if self.cancelled() {
            warn!("Collection interrupted; keeping {} finished projects", assembler.project_count());
        }

        let snapshot = assembler.finish(&self.options.health_thresholds);
        info!(
            "Collected {} branches across {} projects, {} blocker issues",
            snapshot.branch_count(),
            snapshot.projects.len(),
            snapshot.blocker_count()
        );
        Ok(snapshot)
    }

    fn collect_projects(
        &self,
        enumerator: &Enumerator<'_>,
        projects: &[ProjectComponent],
    ) -> Result<Vec<Option<ProjectResult>>, RunError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.workers.clamp(1, 32))
            .build()?;

        let finished = AtomicUsize::new(0);
        let total = projects.len();

        Ok(pool.install(|| {
            projects
                .par_iter()
                .map(|component| {
                    if self.cancelled() {
                        return None;
                    }
                    let result = self.collect_project(enumerator, component);
                    let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(ref callback) = self.progress_callback {
                        callback(&component.name, done, total);
                    }
                    result
                })
                .collect()
        }))
    }

    /// `None` when cancellation interrupted the project
    fn collect_project(
        &self,
        enumerator: &Enumerator<'_>,
        component: &ProjectComponent,
    ) -> Option<ProjectResult> {
        let branches = enumerator.branches(&component.key);
        let mut errors = branches.errors;
        let collector = BranchCollector::new(self.client, &self.options, self.now);

        let outcomes: Vec<Option<_>> = branches
            .items
            .par_iter()
            .map(|branch| {
                if self.cancelled() {
                    return None;
                }
                Some((branch, collector.collect(&component.key, branch)))
            })
            .collect();

        if outcomes.iter().any(Option::is_none) {
            return None;
        }

        let attempted = outcomes.len();
        let mut kept: Vec<(&Branch, BranchSnapshot)> = Vec::with_capacity(attempted);
        for (branch, outcome) in outcomes.into_iter().flatten() {
            errors.extend(outcome.errors);
            if let Some(snapshot) = outcome.snapshot {
                kept.push((branch, snapshot));
            }
        }

        info!(
            "{}: {}/{} branches collected",
            component.name,
            kept.len(),
            attempted
        );

        let main_qg_status = main_gate_status(&kept);
        Some(ProjectResult {
            project: ProjectSnapshot {
                key: component.key.clone(),
                name: component.name.clone(),
                main_qg_status,
                branches: kept.into_iter().map(|(_, snapshot)| snapshot).collect(),
            },
            errors,
        })
    }
}

/// Gate status of the flagged main branch, else the first branch named
/// main/master. Other branches never set it.
fn main_gate_status(branches: &[(&Branch, BranchSnapshot)]) -> QualityGateStatus {
    branches
        .iter()
        .find(|(b, _)| b.is_main)
        .or_else(|| branches.iter().find(|(b, _)| b.is_primary()))
        .map(|(_, snapshot)| snapshot.qg_status)
        .unwrap_or_default()
}
