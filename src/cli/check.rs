//! `check` command: pre-flight only

use super::ServerArgs;
use crate::api::SonarClient;
use crate::config::SonarConfig;
use anyhow::{bail, Result};
use console::style;

pub fn run(args: &ServerArgs, mut config: SonarConfig) -> Result<()> {
    let (url, token) = args.resolve(&mut config)?;
    let client = SonarClient::connect(config.client_config(&url, &token));

    println!("\n{} {}\n", style("Checking").bold(), style(client.base_url()).cyan());

    match client.preflight() {
        Ok(report) => {
            println!("  {} Server status {}", style("[OK]").green(), report.status);
            println!(
                "  {} Version {}",
                style("[OK]").green(),
                report.version.as_deref().unwrap_or("unknown")
            );
            println!(
                "  {} Token accepted, {} projects visible",
                style("[OK]").green(),
                report.visible_projects
            );
            Ok(())
        }
        Err(e) => {
            println!("  {} {}", style("[FAIL]").red(), e);
            bail!("Pre-flight check failed: {}", e);
        }
    }
}
