//! Layered `sonarscope.toml` configuration
//!
//! Later layers override earlier ones key by key:
//! defaults < user file < project file (or `--config`) < CLI flags / env.
//! The CLI layer is applied by the caller.

use crate::api::ClientConfig;
use crate::collector::CollectOptions;
use crate::pagination::PageLimits;
use crate::scoring::BandThresholds;
use crate::snapshot::DEFAULT_OUTPUT;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Project-level config file name
pub const CONFIG_FILE: &str = "sonarscope.toml";

pub const MAX_WORKERS: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub url: Option<String>,
    /// Skip TLS certificate validation
    pub insecure: bool,
    pub timeout_secs: u64,
    pub health_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: None,
            insecure: false,
            timeout_secs: 30,
            health_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectConfig {
    pub workers: usize,
    pub project_page_size: u64,
    pub project_max_pages: u32,
    pub issue_page_size: u64,
    pub issue_max_pages: u32,
    pub hotspot_page_size: u64,
    pub hotspot_max_pages: u32,
    pub history_page_size: u64,
    pub analyses_page_size: u64,
    pub coverage_history_days: i64,
    pub defect_history_days: i64,
    pub quality_gate_history_days: i64,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            project_page_size: 500,
            project_max_pages: 200,
            issue_page_size: 500,
            issue_max_pages: 10,
            hotspot_page_size: 500,
            hotspot_max_pages: 20,
            history_page_size: 1000,
            analyses_page_size: 100,
            coverage_history_days: 90,
            defect_history_days: 30,
            quality_gate_history_days: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_OUTPUT),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SonarConfig {
    pub server: ServerConfig,
    pub collect: CollectConfig,
    pub thresholds: BandThresholds,
    pub output: OutputConfig,
}

impl SonarConfig {
    /// Load user and project files.
    ///
    /// An explicit `--config` path must exist and parse. The implicit files
    /// are skipped with a warning when unreadable.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let user = super::user_config_path().filter(|p| p.exists());
        match explicit {
            Some(path) => {
                let project = read_layer(path)?;
                Self::from_layers(user.and_then(|p| read_layer_lenient(&p)), Some(project))
            }
            None => {
                let local = PathBuf::from(CONFIG_FILE);
                let project = local.exists().then(|| read_layer_lenient(&local)).flatten();
                Self::from_layers(user.and_then(|p| read_layer_lenient(&p)), project)
            }
        }
    }

    /// Merge parsed layers over the defaults
    pub fn from_layers(user: Option<toml::Table>, project: Option<toml::Table>) -> Result<Self> {
        let mut merged = toml::Table::new();
        for layer in [user, project].into_iter().flatten() {
            merge_tables(&mut merged, layer);
        }

        if merged
            .get("server")
            .and_then(|s| s.get("token"))
            .is_some()
        {
            warn!("Ignoring server.token in config file; use SONAR_TOKEN or --token");
        }

        let config: SonarConfig = toml::Value::Table(merged)
            .try_into::<SonarConfig>()
            .context("Invalid configuration")?;
        Ok(config.validated())
    }

    fn validated(mut self) -> Self {
        let (thresholds, replaced) = self.thresholds.sanitized();
        for name in replaced {
            warn!(
                "thresholds.{} must be four strictly descending numbers; using defaults",
                name
            );
        }
        self.thresholds = thresholds;

        let workers = self.collect.workers.clamp(1, MAX_WORKERS);
        if workers != self.collect.workers {
            warn!(
                "collect.workers = {} out of range, using {}",
                self.collect.workers, workers
            );
            self.collect.workers = workers;
        }
        self
    }

    /// Client settings for `url` (already resolved against CLI/env)
    pub fn client_config(&self, url: &str, token: &str) -> ClientConfig {
        let mut config = ClientConfig::new(url, token);
        config.insecure = self.server.insecure;
        config.timeout = Duration::from_secs(self.server.timeout_secs);
        config.health_timeout = Duration::from_secs(self.server.health_timeout_secs);
        config
    }

    pub fn collect_options(&self) -> CollectOptions {
        let c = &self.collect;
        CollectOptions {
            workers: c.workers,
            project_limits: PageLimits::new(c.project_page_size, c.project_max_pages),
            issue_limits: PageLimits::new(c.issue_page_size, c.issue_max_pages),
            hotspot_limits: PageLimits::new(c.hotspot_page_size, c.hotspot_max_pages),
            history_page_size: c.history_page_size,
            analyses_page_size: c.analyses_page_size,
            coverage_history_days: c.coverage_history_days,
            defect_history_days: c.defect_history_days,
            quality_gate_history_days: c.quality_gate_history_days,
            health_thresholds: self.thresholds.health,
        }
    }
}

fn read_layer(path: &Path) -> Result<toml::Table> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let table = toml::from_str::<toml::Table>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    debug!("Loaded config from {}", path.display());
    Ok(table)
}

fn read_layer_lenient(path: &Path) -> Option<toml::Table> {
    match read_layer(path) {
        Ok(table) => Some(table),
        Err(e) => {
            warn!("{:#}", e);
            None
        }
    }
}

/// Recursive key-by-key merge; `over` wins
fn merge_tables(base: &mut toml::Table, over: toml::Table) {
    for (key, value) in over {
        let incoming = match value {
            toml::Value::Table(incoming) => incoming,
            other => {
                base.insert(key, other);
                continue;
            }
        };
        if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
            merge_tables(existing, incoming);
            continue;
        }
        base.insert(key, toml::Value::Table(incoming));
    }
}
