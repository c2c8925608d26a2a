//! Run snapshot assembly and persistence
//!
//! The assembler is the only mutator of run-level counters. The finished
//! snapshot is written as one JSON document via a temp file and rename, so
//! a reader never sees a half-written file.

use crate::collector::CollectError;
use crate::models::{ProjectSnapshot, QualityGateStatus, RunSnapshot};
use crate::scoring::{HealthScorer, Thresholds};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Default output file name read by the dashboard renderer
pub const DEFAULT_OUTPUT: &str = "sonarqube_dashboard_data.json";

pub struct SnapshotAssembler {
    snapshot: RunSnapshot,
}

impl SnapshotAssembler {
    pub fn new(sonar_url: &str, collection_date: DateTime<Utc>) -> Self {
        Self {
            snapshot: RunSnapshot {
                collection_date,
                sonar_url: sonar_url.to_string(),
                total_projects: 0,
                projects_main_passed: 0,
                projects_main_failed: 0,
                projects_main_none: 0,
                projects: Vec::new(),
                health: None,
                diagnostics: Vec::new(),
            },
        }
    }

    /// Number of projects enumerated, collected or not
    pub fn set_total_projects(&mut self, total: usize) {
        self.snapshot.total_projects = total;
    }

    pub fn record(&mut self, error: &CollectError) {
        self.snapshot.diagnostics.push(error.to_diagnostic());
    }

    pub fn project_count(&self) -> usize {
        self.snapshot.projects.len()
    }

    pub fn merge_project(&mut self, project: ProjectSnapshot) {
        match project.main_qg_status {
            QualityGateStatus::Ok => self.snapshot.projects_main_passed += 1,
            QualityGateStatus::Error => self.snapshot.projects_main_failed += 1,
            QualityGateStatus::None => self.snapshot.projects_main_none += 1,
        }
        self.snapshot.projects.push(project);
    }

    /// Compute the health score and hand over the finished snapshot
    pub fn finish(mut self, thresholds: &Thresholds) -> RunSnapshot {
        let score = HealthScorer::new(thresholds).calculate(&self.snapshot.projects);
        self.snapshot.health = Some(score);
        self.snapshot
    }
}

/// Write `snapshot` to `path` atomically
pub fn write_atomic(snapshot: &RunSnapshot, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    // Write to temp file first, then rename (atomic on POSIX)
    let tmp_file = path.with_extension("json.tmp");
    {
        let file = File::create(&tmp_file)
            .with_context(|| format!("Failed to create {}", tmp_file.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, snapshot).context("Failed to serialize snapshot")?;
        writer.flush().context("Failed to flush snapshot")?;
    }
    fs::rename(&tmp_file, path)
        .with_context(|| format!("Failed to move snapshot into {}", path.display()))?;

    debug!("Wrote snapshot with {} projects to {}", snapshot.projects.len(), path.display());
    Ok(())
}

pub fn load(path: &Path) -> Result<RunSnapshot> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("{} is not a valid snapshot", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::collector::StepContext;
    use crate::models::Step;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn project(key: &str, qg: QualityGateStatus) -> ProjectSnapshot {
        ProjectSnapshot {
            key: key.to_string(),
            name: key.to_uppercase(),
            main_qg_status: qg,
            branches: Vec::new(),
        }
    }

    fn assembled() -> RunSnapshot {
        let date = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let mut asm = SnapshotAssembler::new("https://sonar.example.com", date);
        asm.set_total_projects(4);
        asm.merge_project(project("a", QualityGateStatus::Ok));
        asm.merge_project(project("b", QualityGateStatus::None));
        asm.merge_project(project("c", QualityGateStatus::Error));
        asm.record(&CollectError::classify(
            StepContext::branch("c", "main", Step::Hotspots),
            ApiError::Server { status: 500 },
        ));
        asm.finish(&Thresholds::new(90.0, 75.0, 60.0, 40.0))
    }

    #[test]
    fn test_counters_follow_main_status() {
        let snap = assembled();
        assert_eq!(snap.total_projects, 4);
        assert_eq!(snap.projects_main_passed, 1);
        assert_eq!(snap.projects_main_failed, 1);
        assert_eq!(snap.projects_main_none, 1);
        assert_eq!(snap.projects.len(), 3);
        assert_eq!(snap.diagnostics.len(), 1);
        assert!(snap.health.is_some());
    }

    #[test]
    fn test_write_then_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out").join(DEFAULT_OUTPUT);
        let snap = assembled();

        write_atomic(&snap, &path).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let back = load(&path).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn test_top_level_field_names() {
        let json = serde_json::to_value(assembled()).unwrap();
        for key in [
            "collection_date",
            "sonar_url",
            "total_projects",
            "projects_main_passed",
            "projects_main_failed",
            "projects_main_none",
            "projects",
            "health",
            "diagnostics",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(json["projects"][0]["main_qg_status"], "OK");
    }

    #[test]
    fn test_load_rejects_garbage() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.json");
        fs::write(&path, "{\"projects\": 3}").unwrap();
        assert!(load(&path).is_err());
    }
}
