//! Failure dispositions for collection steps

use crate::api::ApiError;
use crate::models::{Diagnostic, Step};
use std::fmt;
use thiserror::Error;

/// Where a failure happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepContext {
    pub project: Option<String>,
    pub branch: Option<String>,
    pub step: Step,
}

impl StepContext {
    pub fn run(step: Step) -> Self {
        Self {
            project: None,
            branch: None,
            step,
        }
    }

    pub fn project(project: &str, step: Step) -> Self {
        Self {
            project: Some(project.to_string()),
            branch: None,
            step,
        }
    }

    pub fn branch(project: &str, branch: &str, step: Step) -> Self {
        Self {
            project: Some(project.to_string()),
            branch: Some(branch.to_string()),
            step,
        }
    }
}

impl fmt::Display for StepContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.project, &self.branch) {
            (Some(p), Some(b)) => write!(f, "{} [{}] {}", p, b, self.step),
            (Some(p), None) => write!(f, "{} {}", p, self.step),
            _ => write!(f, "{}", self.step),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectError {
    /// Aborts the run
    #[error("{context} failed: {source}")]
    Fatal { context: StepContext, source: ApiError },

    /// The step's empty default was substituted
    #[error("{context} failed, using empty default: {source}")]
    Recoverable { context: StepContext, source: ApiError },

    /// The enclosing unit was dropped
    #[error("{context} failed, branch dropped: {source}")]
    Partial { context: StepContext, source: ApiError },
}

impl CollectError {
    /// Apply the disposition rules for a failure at `context.step`
    pub fn classify(context: StepContext, source: ApiError) -> Self {
        match context.step {
            Step::Preflight => CollectError::Fatal { context, source },
            Step::Projects | Step::Branches => CollectError::Recoverable { context, source },
            Step::Metrics if source.is_auth() || source.is_not_found() => {
                CollectError::Partial { context, source }
            }
            _ => CollectError::Recoverable { context, source },
        }
    }

    pub fn context(&self) -> &StepContext {
        match self {
            CollectError::Fatal { context, .. }
            | CollectError::Recoverable { context, .. }
            | CollectError::Partial { context, .. } => context,
        }
    }

    pub fn api_error(&self) -> &ApiError {
        match self {
            CollectError::Fatal { source, .. }
            | CollectError::Recoverable { source, .. }
            | CollectError::Partial { source, .. } => source,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, CollectError::Fatal { .. })
    }

    pub fn drops_unit(&self) -> bool {
        matches!(self, CollectError::Partial { .. })
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let context = self.context();
        Diagnostic {
            project: context.project.clone(),
            branch: context.branch.clone(),
            step: context.step,
            dropped: self.drops_unit(),
            message: self.api_error().to_string(),
        }
    }
}

/// Run-level failures. Nothing is persisted when one of these is returned.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("pre-flight check failed: {0}")]
    Preflight(#[source] CollectError),

    /// Enumeration yielded nothing. `listing` is set when the listing
    /// itself failed rather than the server having no projects.
    #[error(
        "no projects listed{}",
        .listing.as_ref().map(|e| format!(": {}", e)).unwrap_or_default()
    )]
    NoProjects { listing: Option<CollectError> },

    #[error("cannot start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(step: Step) -> StepContext {
        StepContext::branch("proj", "main", step)
    }

    #[test]
    fn test_metrics_step_drops_branch_on_auth_or_missing() {
        let e = CollectError::classify(at(Step::Metrics), ApiError::Auth { status: 403 });
        assert!(e.drops_unit());
        let e = CollectError::classify(
            at(Step::Metrics),
            ApiError::NotFound {
                path: "/api/measures/component".to_string(),
            },
        );
        assert!(e.drops_unit());
        let e = CollectError::classify(at(Step::Metrics), ApiError::Server { status: 502 });
        assert!(matches!(e, CollectError::Recoverable { .. }));
    }

    #[test]
    fn test_later_steps_never_drop_branch() {
        for step in [
            Step::QualityGate,
            Step::CoverageHistory,
            Step::DefectHistory,
            Step::QualityGateHistory,
            Step::Issues,
            Step::Hotspots,
        ] {
            let missing = ApiError::NotFound {
                path: "/x".to_string(),
            };
            assert!(!CollectError::classify(at(step), missing).drops_unit());
            let e = CollectError::classify(at(step), ApiError::Auth { status: 401 });
            assert!(matches!(e, CollectError::Recoverable { .. }));
        }
    }

    #[test]
    fn test_enumeration_failures_are_recoverable() {
        let auth = ApiError::Auth { status: 401 };
        let e = CollectError::classify(StepContext::run(Step::Projects), auth.clone());
        assert!(matches!(e, CollectError::Recoverable { .. }));
        let e = CollectError::classify(StepContext::project("p", Step::Branches), auth);
        assert!(matches!(e, CollectError::Recoverable { .. }));
    }

    #[test]
    fn test_preflight_is_fatal() {
        let e = CollectError::classify(
            StepContext::run(Step::Preflight),
            ApiError::Connectivity("connection refused".to_string()),
        );
        assert!(e.is_fatal());
    }

    #[test]
    fn test_diagnostic_carries_context() {
        let e = CollectError::classify(at(Step::Issues), ApiError::Server { status: 500 });
        let d = e.to_diagnostic();
        assert_eq!(d.project.as_deref(), Some("proj"));
        assert_eq!(d.branch.as_deref(), Some("main"));
        assert_eq!(d.step, Step::Issues);
        assert!(!d.dropped);
        assert!(e.to_string().starts_with("proj [main] issue listing failed"));
    }

    #[test]
    fn test_no_projects_names_listing_failure() {
        let empty = RunError::NoProjects { listing: None };
        assert_eq!(empty.to_string(), "no projects listed");

        let failed = RunError::NoProjects {
            listing: Some(CollectError::classify(
                StepContext::run(Step::Projects),
                ApiError::Server { status: 503 },
            )),
        };
        let msg = failed.to_string();
        assert!(msg.starts_with("no projects listed: project listing failed"));
        assert!(msg.contains("HTTP 503"));
    }
}
