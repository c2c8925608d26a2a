//! User-level config location and the starter file written by `init`

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// `~/.config/sonarscope/config.toml` (platform equivalent elsewhere)
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("sonarscope").join("config.toml"))
}

pub const EXAMPLE_CONFIG: &str = r#"# sonarscope configuration
#
# The token is never read from this file. Set SONAR_TOKEN or pass --token.

[server]
# url = "https://sonarqube.example.com"
# Skip TLS certificate validation (self-signed servers only)
insecure = false
timeout_secs = 30
health_timeout_secs = 10

[collect]
# Concurrent branch collections (1-32)
workers = 4
project_page_size = 500
project_max_pages = 200
# 10 pages x 500 = at most 5000 issues per branch
issue_page_size = 500
issue_max_pages = 10
# 20 pages x 500 = at most 10000 hotspots per branch
hotspot_page_size = 500
hotspot_max_pages = 20
history_page_size = 1000
analyses_page_size = 100
coverage_history_days = 90
defect_history_days = 30
quality_gate_history_days = 30

# Four strictly descending cut-offs: excellent, good, warning, danger
[thresholds]
health = [90, 75, 60, 40]
quality_gate = [80, 60, 40, 20]
coverage = [80, 70, 50, 30]
# Applied to 100 - duplication
duplication = [95, 90, 80, 70]
# Applied to 100 - min(bugs per KLOC x 10, 100)
bugs = [80, 60, 40, 20]
# Applied to 100 - min(vulnerabilities per KLOC x 20, 100)
vulnerabilities = [80, 60, 40, 20]

[output]
path = "sonarqube_dashboard_data.json"
"#;

/// Write the example config to `path`. Never overwrites.
pub fn write_example_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SonarConfig;
    use tempfile::TempDir;

    #[test]
    fn test_example_config_parses_to_defaults() {
        let table: toml::Table = toml::from_str(EXAMPLE_CONFIG).unwrap();
        let config = SonarConfig::from_layers(None, Some(table)).unwrap();
        assert_eq!(config, SonarConfig::default());
    }

    #[test]
    fn test_write_refuses_overwrite() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sonarscope.toml");
        write_example_config(&path).unwrap();
        assert!(write_example_config(&path).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), EXAMPLE_CONFIG);
    }

    #[test]
    fn test_user_config_path_shape() {
        if let Some(p) = user_config_path() {
            assert!(p.ends_with("sonarscope/config.toml"));
        }
    }
}
