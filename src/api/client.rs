//! Typed SonarQube client
//!
//! Wraps a [`Transport`] and exposes one method per endpoint. Every method
//! returns decoded wire types; shape mismatches surface as
//! [`ApiError::Decode`] instead of reaching the aggregation code.

use super::transport::{ApiRequest, Transport, UreqTransport};
use super::types::{
    AnalysesResponse, Branch, BranchList, ComponentMeasures, HistoryResponse, Hotspot,
    HotspotsPage, Issue, IssuesPage, ProjectComponent, ProjectsPage, QualityGateResponse,
    SystemStatus,
};
use super::{ApiError, ApiResult};
use crate::models::{MetricHistory, MetricKey, MetricSnapshot, QualityGateStatus};
use crate::pagination::Page;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Connection settings for one analysis server
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: String,
    /// Skip TLS certificate validation. Off unless explicitly requested.
    pub insecure: bool,
    /// Per-request timeout for regular calls
    pub timeout: Duration,
    /// Timeout for the unauthenticated liveness call
    pub health_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: &str, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            token: token.into(),
            insecure: false,
            timeout: Duration::from_secs(30),
            health_timeout: Duration::from_secs(10),
        }
    }
}

/// What the pre-flight calls learned about the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightReport {
    pub status: String,
    pub version: Option<String>,
    /// Projects visible to the credential
    pub visible_projects: u64,
}

pub struct SonarClient {
    config: ClientConfig,
    transport: Box<dyn Transport>,
}

impl SonarClient {
    pub fn new(transport: impl Transport + 'static, config: ClientConfig) -> Self {
        Self {
            config,
            transport: Box::new(transport),
        }
    }

    /// Client over real HTTP
    pub fn connect(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(&config);
        Self::new(transport, config)
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn call(&self, path: &str) -> ApiRequest {
        ApiRequest::get(path, self.config.timeout)
    }

    /// Execute a request and decode the body into `R`
    pub fn request<R: DeserializeOwned>(&self, request: &ApiRequest) -> ApiResult<R> {
        let body = self.transport.get(request)?;
        serde_json::from_value(body).map_err(|e| ApiError::Decode {
            path: request.path.clone(),
            message: e.to_string(),
        })
    }

    /// Unauthenticated liveness call
    pub fn system_status(&self) -> ApiResult<SystemStatus> {
        let req = ApiRequest::get("/api/system/status", self.config.health_timeout).anonymous();
        self.request(&req)
    }

    /// Liveness call followed by one authenticated listing call.
    ///
    /// Either failing means the run cannot proceed.
    pub fn preflight(&self) -> ApiResult<PreflightReport> {
        let status = self.system_status()?;
        debug!(
            "Server status {} (version {:?})",
            status.status, status.version
        );

        let req = self.call("/api/projects/search").param("ps", 1);
        let page: ProjectsPage = self.request(&req)?;

        Ok(PreflightReport {
            status: status.status,
            version: status.version,
            visible_projects: page.paging.total,
        })
    }

    pub fn projects_page(&self, page: u32, page_size: u64) -> ApiResult<Page<ProjectComponent>> {
        let req = self
            .call("/api/projects/search")
            .param("p", page)
            .param("ps", page_size);
        let body: ProjectsPage = self.request(&req)?;
        Ok(Page {
            items: body.components,
            total: body.paging.total,
        })
    }

    pub fn branches(&self, project: &str) -> ApiResult<Vec<Branch>> {
        let req = self
            .call("/api/project_branches/list")
            .param("project", project);
        let body: BranchList = self.request(&req)?;
        Ok(body.branches)
    }

    pub fn current_metrics(&self, project: &str, branch: Option<&str>) -> ApiResult<MetricSnapshot> {
        let req = self
            .call("/api/measures/component")
            .param("component", project)
            .param("metricKeys", MetricKey::request_list())
            .branch(branch);
        let body: ComponentMeasures = self.request(&req)?;

        let mut metrics = MetricSnapshot::new();
        for measure in body.component.measures {
            if let Some(value) = measure.value {
                metrics.insert_raw(&measure.metric, &value);
            }
        }
        Ok(metrics)
    }

    pub fn quality_gate_status(
        &self,
        project: &str,
        branch: Option<&str>,
    ) -> ApiResult<QualityGateStatus> {
        let req = self
            .call("/api/qualitygates/project_status")
            .param("projectKey", project)
            .branch(branch);
        let body: QualityGateResponse = self.request(&req)?;
        Ok(body.status())
    }

    /// History for a comma-separated metric list since `from`
    pub fn metric_history(
        &self,
        project: &str,
        metrics: &str,
        from: NaiveDate,
        branch: Option<&str>,
        page_size: u64,
    ) -> ApiResult<Vec<MetricHistory>> {
        let req = self
            .call("/api/measures/search_history")
            .param("component", project)
            .param("metrics", metrics)
            .param("from", from.format("%Y-%m-%d"))
            .param("ps", page_size)
            .branch(branch);
        let body: HistoryResponse = self.request(&req)?;
        Ok(body.measures)
    }

    pub fn analyses(
        &self,
        project: &str,
        branch: Option<&str>,
        page_size: u64,
    ) -> ApiResult<AnalysesResponse> {
        let req = self
            .call("/api/project_analyses/search")
            .param("project", project)
            .param("ps", page_size)
            .branch(branch);
        self.request(&req)
    }

    /// One page of unresolved issues
    pub fn issues_page(
        &self,
        project: &str,
        branch: Option<&str>,
        page: u32,
        page_size: u64,
    ) -> ApiResult<Page<Issue>> {
        let req = self
            .call("/api/issues/search")
            .param("componentKeys", project)
            .param("p", page)
            .param("ps", page_size)
            .param("resolved", "false")
            .branch(branch);
        let body: IssuesPage = self.request(&req)?;
        let total = body.total();
        Ok(Page {
            items: body.issues,
            total,
        })
    }

    pub fn hotspots_page(
        &self,
        project: &str,
        branch: Option<&str>,
        page: u32,
        page_size: u64,
    ) -> ApiResult<Page<Hotspot>> {
        let req = self
            .call("/api/hotspots/search")
            .param("projectKey", project)
            .param("p", page)
            .param("ps", page_size)
            .branch(branch);
        let body: HotspotsPage = self.request(&req)?;
        Ok(Page {
            items: body.hotspots,
            total: body.paging.total,
        })
    }
}
