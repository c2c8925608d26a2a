//! `init` command

use crate::config::write_example_config;
use anyhow::Result;
use console::style;
use std::path::Path;

pub fn run(path: &Path) -> Result<()> {
    write_example_config(path)?;
    println!("  {} Created {}", style("[OK]").green(), style(path.display()).cyan());
    println!(
        "  {} Set {} in the environment; tokens are never read from the file",
        style("[--]").dim(),
        style("SONAR_TOKEN").bold()
    );
    Ok(())
}
