//! End-to-end collection runs against an in-memory server

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use sonarscope::api::{ApiError, ApiRequest, ApiResult, ClientConfig, SonarClient, Transport};
use sonarscope::collector::{CollectOptions, Collector, RunError};
use sonarscope::models::{MetricKey, QualityGateStatus, Step};
use sonarscope::pagination::PageLimits;
use sonarscope::snapshot;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Clone, Default)]
struct FakeBranch {
    name: String,
    is_main: bool,
    measures: Vec<(&'static str, &'static str)>,
    gate: Option<&'static str>,
    issues: Vec<Value>,
    metrics_error: Option<ApiError>,
}

#[derive(Clone, Default)]
struct FakeProject {
    key: String,
    /// Empty means the server lists no branches
    branches: Vec<FakeBranch>,
}

#[derive(Default)]
struct FakeServer {
    projects: Vec<FakeProject>,
    down: bool,
    /// Override for the reported issue total
    issue_total: Option<u64>,
    /// Paged project listing fails (the pre-flight `ps=1` call still works)
    listing_error: Option<ApiError>,
    /// Endpoint that rejects the token
    forbidden: Option<&'static str>,
    seen: Arc<Mutex<Vec<ApiRequest>>>,
}

impl FakeServer {
    fn branch(&self, request: &ApiRequest, project_param: &str) -> Option<FakeBranch> {
        let project = request.query_value(project_param)?;
        let branch = request.query_value("branch").unwrap_or("main");
        let p = self.projects.iter().find(|p| p.key == project)?;
        if p.branches.is_empty() {
            return Some(FakeBranch {
                name: "main".to_string(),
                is_main: true,
                ..Default::default()
            });
        }
        p.branches.iter().find(|b| b.name == branch).cloned()
    }

    fn page_of(&self, request: &ApiRequest) -> (usize, usize) {
        let page: usize = request.query_value("p").unwrap_or("1").parse().unwrap();
        let size: usize = request.query_value("ps").unwrap_or("100").parse().unwrap();
        (page, size)
    }
}

impl Transport for FakeServer {
    fn get(&self, request: &ApiRequest) -> ApiResult<Value> {
        self.seen.lock().unwrap().push(request.clone());
        if self.down {
            return Err(ApiError::Connectivity("connection refused".to_string()));
        }
        if self.forbidden == Some(request.path.as_str()) {
            return Err(ApiError::Auth { status: 403 });
        }
        let not_found = || ApiError::NotFound {
            path: request.path.clone(),
        };
        match request.path.as_str() {
            "/api/system/status" => Ok(json!({"status": "UP", "version": "10.4.1"})),
            "/api/projects/search" => {
                if let (Some(e), Some(_)) = (&self.listing_error, request.query_value("p")) {
                    return Err(e.clone());
                }
                let (page, size) = self.page_of(request);
                let components: Vec<Value> = self
                    .projects
                    .iter()
                    .skip((page - 1) * size)
                    .take(size)
                    .map(|p| json!({"key": p.key, "name": p.key.to_uppercase()}))
                    .collect();
                Ok(json!({
                    "paging": {"pageIndex": page, "pageSize": size, "total": self.projects.len()},
                    "components": components,
                }))
            }
            "/api/project_branches/list" => {
                let key = request.query_value("project").ok_or_else(not_found)?;
                let p = self
                    .projects
                    .iter()
                    .find(|p| p.key == key)
                    .ok_or_else(not_found)?;
                let branches: Vec<Value> = p
                    .branches
                    .iter()
                    .map(|b| json!({"name": b.name, "isMain": b.is_main}))
                    .collect();
                Ok(json!({ "branches": branches }))
            }
            "/api/measures/component" => {
                let b = self.branch(request, "component").ok_or_else(not_found)?;
                if let Some(e) = b.metrics_error {
                    return Err(e);
                }
                let measures: Vec<Value> = b
                    .measures
                    .iter()
                    .map(|(m, v)| json!({"metric": m, "value": v}))
                    .collect();
                Ok(json!({"component": {"measures": measures}}))
            }
            "/api/qualitygates/project_status" => {
                let b = self.branch(request, "projectKey").ok_or_else(not_found)?;
                Ok(json!({"projectStatus": {"status": b.gate.unwrap_or("NONE")}}))
            }
            "/api/measures/search_history" => Ok(json!({"measures": []})),
            "/api/project_analyses/search" => Ok(json!({"analyses": []})),
            "/api/issues/search" => {
                let b = self.branch(request, "componentKeys").ok_or_else(not_found)?;
                let (page, size) = self.page_of(request);
                let issues: Vec<Value> = b
                    .issues
                    .iter()
                    .skip((page - 1) * size)
                    .take(size)
                    .cloned()
                    .collect();
                let total = self.issue_total.unwrap_or(b.issues.len() as u64);
                Ok(json!({"total": total, "issues": issues}))
            }
            "/api/hotspots/search" => Ok(json!({"paging": {"total": 0}, "hotspots": []})),
            other => Err(ApiError::NotFound {
                path: other.to_string(),
            }),
        }
    }
}

fn issue(key: &str, severity: &str, kind: &str) -> Value {
    json!({
        "key": key,
        "message": format!("{kind} {key}"),
        "component": "c:src/lib.rs",
        "line": 12,
        "type": kind,
        "severity": severity,
        "rule": "rust:S100",
        "creationDate": "2024-03-04T10:00:00+0000",
    })
}

fn main_branch() -> FakeBranch {
    FakeBranch {
        name: "main".to_string(),
        is_main: true,
        ..Default::default()
    }
}

/// A passes its gate, B lists no branches, C carries one blocker
fn three_projects() -> FakeServer {
    let a = FakeProject {
        key: "a".to_string(),
        branches: vec![FakeBranch {
            measures: vec![("coverage", "85.0"), ("bugs", "2"), ("vulnerabilities", "0")],
            gate: Some("OK"),
            ..main_branch()
        }],
    };
    let b = FakeProject {
        key: "b".to_string(),
        branches: Vec::new(),
    };
    let c = FakeProject {
        key: "c".to_string(),
        branches: vec![FakeBranch {
            issues: vec![issue("C-1", "BLOCKER", "BUG")],
            ..main_branch()
        }],
    };
    FakeServer {
        projects: vec![a, b, c],
        ..Default::default()
    }
}

fn client(server: FakeServer) -> SonarClient {
    SonarClient::new(server, ClientConfig::new("https://sonar.example.com", "squ_test"))
}

fn clock() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
}

#[test]
fn test_full_run_counts_and_health() {
    let c = client(three_projects());
    let snap = Collector::new(&c, CollectOptions::default())
        .with_clock(clock())
        .run()
        .unwrap();

    assert_eq!(snap.sonar_url, "https://sonar.example.com");
    assert_eq!(snap.collection_date, clock());
    assert_eq!(snap.total_projects, 3);
    assert_eq!(snap.projects_main_passed, 1);
    assert_eq!(snap.projects_main_failed, 0);
    assert_eq!(snap.projects_main_none, 2);
    assert_eq!(snap.blocker_count(), 1);
    assert_eq!(snap.branch_count(), 3);
    assert!(snap.diagnostics.is_empty());

    // Projects keep enumeration order
    let keys: Vec<&str> = snap.projects.iter().map(|p| p.key.as_str()).collect();
    assert_eq!(keys, ["a", "b", "c"]);

    let b = &snap.projects[1];
    assert_eq!(b.branches.len(), 1);
    assert_eq!(b.branches[0].name, "main");
    assert!(b.branches[0].is_main);

    let a_main = &snap.projects[0].branches[0];
    assert_eq!(a_main.current_metrics.number(MetricKey::Coverage), Some(85.0));
    assert_eq!(a_main.qg_status, QualityGateStatus::Ok);

    let blocker = &snap.projects[2].branches[0].blocker_issues[0];
    assert_eq!(blocker.key, "C-1");
    assert_eq!(blocker.component, "src/lib.rs");
    assert_eq!(blocker.line, Some(12));

    // 30 (gate) + 25 × 0.85 (coverage) + 20 (no duplication data) + 25 − 25/3 (blockers)
    let health = snap.health.as_ref().unwrap();
    let expected = 30.0 + 21.25 + 20.0 + (25.0 - 25.0 / 3.0);
    assert!((health.health_score - expected).abs() < 1e-9);
    assert_eq!(health.inputs.coverage_branches, 1);
    assert_eq!(health.inputs.projects_with_blockers, 1);
}

#[test]
fn test_auth_failure_drops_only_that_branch() {
    let mut server = three_projects();
    server.projects[0].branches.push(FakeBranch {
        name: "feature/x".to_string(),
        metrics_error: Some(ApiError::Auth { status: 403 }),
        ..Default::default()
    });
    let c = client(server);
    let snap = Collector::new(&c, CollectOptions::default())
        .with_clock(clock())
        .run()
        .unwrap();

    let a = &snap.projects[0];
    assert_eq!(a.branches.len(), 1);
    assert_eq!(a.branches[0].name, "main");
    assert_eq!(a.main_qg_status, QualityGateStatus::Ok);

    assert_eq!(snap.diagnostics.len(), 1);
    let d = &snap.diagnostics[0];
    assert_eq!(d.project.as_deref(), Some("a"));
    assert_eq!(d.branch.as_deref(), Some("feature/x"));
    assert_eq!(d.step, Step::Metrics);
    assert!(d.dropped);
}

#[test]
fn test_server_error_keeps_branch_with_defaults() {
    let mut server = three_projects();
    server.projects[0].branches[0].metrics_error = Some(ApiError::Server { status: 502 });
    let c = client(server);
    let snap = Collector::new(&c, CollectOptions::default())
        .with_clock(clock())
        .run()
        .unwrap();

    let a_main = &snap.projects[0].branches[0];
    assert!(a_main.current_metrics.is_empty());
    assert_eq!(a_main.qg_status, QualityGateStatus::Ok);
    assert_eq!(snap.diagnostics.len(), 1);
    assert!(!snap.diagnostics[0].dropped);
}

#[test]
fn test_issue_page_ceiling_truncates() {
    let mut server = three_projects();
    server.projects[0].branches[0].issues = (0..5)
        .map(|i| issue(&format!("A-{i}"), "MAJOR", "CODE_SMELL"))
        .collect();
    let c = client(server);
    let options = CollectOptions {
        issue_limits: PageLimits::new(2, 1),
        ..Default::default()
    };
    let snap = Collector::new(&c, options)
        .with_clock(clock())
        .run()
        .unwrap();

    let a_main = &snap.projects[0].branches[0];
    assert_eq!(a_main.total_issues, 2);
    assert!(snap.diagnostics.is_empty());
}

#[test]
fn test_no_projects_is_an_error() {
    let c = client(FakeServer::default());
    let result = Collector::new(&c, CollectOptions::default()).run();
    assert!(matches!(result, Err(RunError::NoProjects { listing: None })));
}

#[test]
fn test_unreachable_server_is_fatal() {
    let server = FakeServer {
        down: true,
        ..three_projects()
    };
    let c = client(server);
    match Collector::new(&c, CollectOptions::default()).run() {
        Err(RunError::Preflight(e)) => {
            assert!(e.is_fatal());
            assert_eq!(e.context().step, Step::Preflight);
        }
        other => panic!("expected pre-flight failure, got {:?}", other.map(|s| s.projects.len())),
    }
}

#[test]
fn test_cancelled_before_start_keeps_no_projects() {
    let c = client(three_projects());
    let cancel = Arc::new(AtomicBool::new(true));
    let snap = Collector::new(&c, CollectOptions::default())
        .with_clock(clock())
        .with_cancel_flag(cancel)
        .run()
        .unwrap();

    assert_eq!(snap.total_projects, 3);
    assert!(snap.projects.is_empty());
    assert_eq!(snap.projects_main_passed, 0);
}

#[test]
fn test_progress_reports_every_project() {
    let c = client(three_projects());
    let calls = Arc::new(AtomicUsize::new(0));
    let last = Arc::new(Mutex::new(HashMap::new()));
    let (calls_cb, last_cb) = (calls.clone(), last.clone());

    Collector::new(&c, CollectOptions::default())
        .with_clock(clock())
        .with_progress_callback(Box::new(move |name, done, total| {
            calls_cb.fetch_add(1, Ordering::SeqCst);
            assert_eq!(total, 3);
            last_cb.lock().unwrap().insert(name.to_string(), done);
        }))
        .run()
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let seen = last.lock().unwrap();
    let mut dones: Vec<usize> = seen.values().copied().collect();
    dones.sort_unstable();
    assert_eq!(dones, [1, 2, 3]);
    assert!(seen.contains_key("A"));
}

#[test]
fn test_snapshot_file_round_trips() {
    let c = client(three_projects());
    let snap = Collector::new(&c, CollectOptions::default())
        .with_clock(clock())
        .run()
        .unwrap();

    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join(snapshot::DEFAULT_OUTPUT);
    snapshot::write_atomic(&snap, &path).unwrap();

    let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["projects_main_passed"], 1);
    assert_eq!(raw["projects"][2]["branches"][0]["issues_by_severity"]["BLOCKER"], 1);
    assert_eq!(snapshot::load(&path).unwrap(), snap);
}

#[test]
fn test_forbidden_hotspots_keep_every_branch() {
    let server = FakeServer {
        forbidden: Some("/api/hotspots/search"),
        ..three_projects()
    };
    let c = client(server);
    let snap = Collector::new(&c, CollectOptions::default())
        .with_clock(clock())
        .run()
        .unwrap();

    assert_eq!(snap.branch_count(), 3);
    assert_eq!(snap.projects_main_passed, 1);
    assert_eq!(snap.projects_main_none, 2);
    assert_eq!(snap.blocker_count(), 1);

    assert_eq!(snap.diagnostics.len(), 3);
    for d in &snap.diagnostics {
        assert_eq!(d.step, Step::Hotspots);
        assert!(!d.dropped);
    }
    assert_eq!(snap.projects[0].branches[0].total_hotspots, 0);
}

#[test]
fn test_non_main_branch_skips_gate_call() {
    let mut server = three_projects();
    server.projects[0].branches.push(FakeBranch {
        name: "feature/x".to_string(),
        gate: Some("ERROR"),
        ..Default::default()
    });
    let seen = server.seen.clone();
    let c = client(server);
    let snap = Collector::new(&c, CollectOptions::default())
        .with_clock(clock())
        .run()
        .unwrap();

    let gate_calls: Vec<ApiRequest> = seen
        .lock()
        .unwrap()
        .iter()
        .filter(|r| r.path == "/api/qualitygates/project_status")
        .cloned()
        .collect();
    assert_eq!(gate_calls.len(), 3);
    assert!(gate_calls
        .iter()
        .all(|r| r.query_value("branch") != Some("feature/x")));

    let a = &snap.projects[0];
    let feature = a.branches.iter().find(|b| b.name == "feature/x").unwrap();
    assert_eq!(feature.qg_status, QualityGateStatus::None);
    assert_eq!(a.main_qg_status, QualityGateStatus::Ok);
    assert_eq!(snap.projects_main_passed, 1);
    assert_eq!(snap.projects_main_failed, 0);
}

#[test]
fn test_cancel_mid_run_keeps_finished_projects() {
    let c = client(three_projects());
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    let options = CollectOptions {
        workers: 1,
        ..Default::default()
    };

    let snap = Collector::new(&c, options)
        .with_clock(clock())
        .with_cancel_flag(cancel)
        .with_progress_callback(Box::new(move |_, done, _| {
            if done == 1 {
                flag.store(true, Ordering::SeqCst);
            }
        }))
        .run()
        .unwrap();

    assert_eq!(snap.total_projects, 3);
    assert_eq!(snap.projects.len(), 1);
    assert_eq!(snap.projects[0].key, "a");
    assert_eq!(snap.projects_main_passed, 1);
    assert_eq!(snap.projects_main_none, 0);

    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join(snapshot::DEFAULT_OUTPUT);
    snapshot::write_atomic(&snap, &path).unwrap();
    let back = snapshot::load(&path).unwrap();
    assert_eq!(back.projects.len(), 1);
}

#[test]
fn test_failed_listing_is_reported_with_no_projects() {
    let server = FakeServer {
        listing_error: Some(ApiError::Server { status: 503 }),
        ..three_projects()
    };
    let c = client(server);
    match Collector::new(&c, CollectOptions::default()).run() {
        Err(RunError::NoProjects {
            listing: Some(err),
        }) => {
            assert_eq!(err.context().step, Step::Projects);
            assert_eq!(err.api_error(), &ApiError::Server { status: 503 });
        }
        other => panic!("expected listing failure, got {:?}", other.map(|s| s.projects.len())),
    }
}
