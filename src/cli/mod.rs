//! CLI command definitions and handlers

mod check;
mod collect;
mod init;
mod summary;

use crate::config::{SonarConfig, CONFIG_FILE, MAX_WORKERS};
use crate::scoring::WORST_BRANCHES;
use crate::snapshot::DEFAULT_OUTPUT;
use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Parse and validate workers count (1-32)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > MAX_WORKERS {
        Err(format!("workers cannot exceed {}", MAX_WORKERS))
    } else {
        Ok(n)
    }
}

/// sonarscope - SonarQube portfolio snapshot collector
#[derive(Parser, Debug)]
#[command(name = "sonarscope")]
#[command(
    version,
    about = "Collect metrics, issues and quality-gate history from every SonarQube project and branch into one JSON snapshot",
    after_help = "\
Examples:
  sonarscope --url https://sonar.example.com       Collect (token from SONAR_TOKEN)
  sonarscope collect -o out/data.json --workers 8  Collect to a custom path
  sonarscope check                                 Verify server and token only
  sonarscope summary sonarqube_dashboard_data.json Health score and riskiest branches
  sonarscope init                                  Write an example sonarscope.toml"
)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace). RUST_LOG overrides it.
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Config file (default: ./sonarscope.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Collect options when no subcommand is given
    #[command(flatten)]
    pub collect: CollectArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Server connection flags
#[derive(Args, Debug, Clone, Default)]
pub struct ServerArgs {
    /// Server base URL
    #[arg(long, env = "SONAR_URL")]
    pub url: Option<String>,

    /// User token (never read from config files)
    #[arg(long, env = "SONAR_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Skip TLS certificate validation
    #[arg(long)]
    pub insecure: bool,
}

impl ServerArgs {
    /// Apply flags over `config`, returning (url, token)
    fn resolve(&self, config: &mut SonarConfig) -> Result<(String, String)> {
        if self.insecure {
            config.server.insecure = true;
        }
        let Some(url) = self.url.clone().or_else(|| config.server.url.clone()) else {
            bail!("No server URL: pass --url, set SONAR_URL, or set server.url in {}", CONFIG_FILE);
        };
        let Some(token) = self.token.clone().filter(|t| !t.trim().is_empty()) else {
            bail!("No token: pass --token or set SONAR_TOKEN");
        };
        Ok((url, token))
    }

    /// Fill unset fields from flags given before the subcommand
    fn or(self, outer: &ServerArgs) -> Self {
        Self {
            url: self.url.or_else(|| outer.url.clone()),
            token: self.token.or_else(|| outer.token.clone()),
            insecure: self.insecure || outer.insecure,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct CollectArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Snapshot output path (default: sonarqube_dashboard_data.json)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Concurrent branch collections (1-32)
    #[arg(long, value_parser = parse_workers)]
    pub workers: Option<usize>,
}

impl CollectArgs {
    /// Collect-only flags that never come from the environment
    fn has_collect_flags(&self) -> bool {
        self.output.is_some() || self.workers.is_some()
    }

    fn or(self, outer: &CollectArgs) -> Self {
        Self {
            server: self.server.or(&outer.server),
            output: self.output.or_else(|| outer.output.clone()),
            workers: self.workers.or(outer.workers),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect every project and branch into a snapshot (default)
    Collect(CollectArgs),

    /// Run the pre-flight checks only (server status and token)
    Check(ServerArgs),

    /// Show health score, KPI bands and riskiest branches of a snapshot
    Summary {
        /// Snapshot file
        #[arg(default_value = DEFAULT_OUTPUT)]
        snapshot: PathBuf,

        /// Print the score breakdown as JSON
        #[arg(long)]
        json: bool,

        /// How many branches to rank
        #[arg(long, default_value_t = WORST_BRANCHES)]
        top: usize,
    },

    /// Write an example sonarscope.toml
    Init {
        /// Where to write it
        #[arg(default_value = CONFIG_FILE)]
        path: PathBuf,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    let load = || SonarConfig::load(cli.config.as_deref());
    let outer = &cli.collect;
    let Some(command) = cli.command else {
        return collect::run(outer, load()?);
    };

    match command {
        Commands::Collect(args) => collect::run(&args.or(outer), load()?),
        Commands::Check(args) => {
            reject_collect_flags(outer, "check")?;
            check::run(&args.or(&outer.server), load()?)
        }
        Commands::Summary {
            snapshot,
            json,
            top,
        } => {
            reject_collect_flags(outer, "summary")?;
            summary::run(&snapshot, json, top, &load()?)
        }
        Commands::Init { path } => {
            reject_collect_flags(outer, "init")?;
            init::run(&path)
        }
    }
}

fn reject_collect_flags(outer: &CollectArgs, command: &str) -> Result<()> {
    if outer.has_collect_flags() {
        bail!("--output and --workers only apply to collect, not {}", command);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_workers_bounds() {
        assert_eq!(parse_workers("1"), Ok(1));
        assert_eq!(parse_workers("32"), Ok(32));
        assert!(parse_workers("0").is_err());
        assert!(parse_workers("33").is_err());
        assert!(parse_workers("many").is_err());
    }

    #[test]
    fn test_default_command_takes_collect_flags() {
        let cli = Cli::try_parse_from([
            "sonarscope",
            "--url",
            "https://sonar.example.com",
            "--token",
            "t",
            "-o",
            "x.json",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.collect.output, Some(PathBuf::from("x.json")));
    }

    #[test]
    fn test_summary_defaults() {
        let cli = Cli::try_parse_from(["sonarscope", "summary"]).unwrap();
        match cli.command {
            Some(Commands::Summary { snapshot, json, top }) => {
                assert_eq!(snapshot, PathBuf::from(DEFAULT_OUTPUT));
                assert!(!json);
                assert_eq!(top, 10);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_before_subcommand() {
        let cli = Cli::try_parse_from([
            "sonarscope",
            "--config",
            "custom.toml",
            "--log-level",
            "info",
            "summary",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert_eq!(cli.log_level, "info");
        assert!(matches!(cli.command, Some(Commands::Summary { .. })));

        let cli = Cli::try_parse_from(["sonarscope", "--log-level", "debug", "check"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Check(_))));
    }

    #[test]
    fn test_outer_flags_fill_subcommand() {
        let cli = Cli::try_parse_from([
            "sonarscope",
            "--url",
            "https://outer.example.com",
            "-o",
            "outer.json",
            "collect",
            "--workers",
            "2",
        ])
        .unwrap();
        let Some(Commands::Collect(args)) = cli.command else {
            panic!("expected collect");
        };
        let merged = args.or(&cli.collect);
        assert_eq!(merged.server.url.as_deref(), Some("https://outer.example.com"));
        assert_eq!(merged.output, Some(PathBuf::from("outer.json")));
        assert_eq!(merged.workers, Some(2));
    }

    #[test]
    fn test_collect_flags_rejected_for_other_commands() {
        let outer = CollectArgs {
            workers: Some(3),
            ..Default::default()
        };
        assert!(reject_collect_flags(&outer, "summary").is_err());
        assert!(reject_collect_flags(&CollectArgs::default(), "summary").is_ok());
    }

    #[test]
    fn test_resolve_requires_token() {
        let mut config = SonarConfig::default();
        config.server.url = Some("https://sonar.example.com".to_string());
        let args = ServerArgs {
            url: None,
            token: Some("  ".to_string()),
            insecure: true,
        };
        assert!(args.resolve(&mut config).is_err());
        assert!(config.server.insecure);

        let args = ServerArgs {
            token: Some("squ_x".to_string()),
            ..Default::default()
        };
        let (url, token) = args.resolve(&mut config).unwrap();
        assert_eq!(url, "https://sonar.example.com");
        assert_eq!(token, "squ_x");
    }
}
