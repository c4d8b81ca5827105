//! Import command - load package metadata dumps into the store.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use std::path::PathBuf;

use crate::config::ReqoptConfig;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Dump files or http(s) URLs
    #[arg(value_name = "SOURCE", required = true)]
    pub sources: Vec<String>,

    /// SQLite package store
    #[arg(long)]
    pub database: Option<PathBuf>,
}

pub fn execute(args: ImportArgs, mut config: ReqoptConfig) -> Result<i32> {
    if let Some(database) = args.database {
        config.set_database(database);
    }

    let path = config.database_path();
    let mut registry = crate::open_registry(&path)?;

    let summary = reqopt::import_sources(&mut registry, &args.sources).context("Import failed, nothing was written")?;

    println!(
        "{} Imported {} packages and {} releases into {}",
        style("Success:").green().bold(),
        summary.packages,
        summary.releases,
        path.display()
    );
    if summary.skipped > 0 {
        println!(
            "{} Skipped {} releases with unparsable versions",
            style("Warning:").yellow(),
            summary.skipped
        );
    }

    Ok(0)
}
