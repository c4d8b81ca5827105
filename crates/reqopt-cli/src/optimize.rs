//! Optimize command - run one request without the HTTP API.

use anyhow::{bail, Context, Result};
use clap::Args;
use reqopt::{OptimizeRequest, PlatformFilter, RequirementOptimizer};
use std::io::Read;
use std::path::PathBuf;

use crate::config::ReqoptConfig;

#[derive(Args, Debug)]
pub struct OptimizeArgs {
    /// Request payload, or "-" for stdin
    #[arg(value_name = "FILE", default_value = "-")]
    pub input: String,

    /// Platform version of the requesting client
    #[arg(long)]
    pub platform_version: Option<String>,

    /// SQLite package store
    #[arg(long)]
    pub database: Option<PathBuf>,
}

fn read_payload(input: &str) -> Result<String> {
    if input == "-" {
        let mut body = String::new();
        std::io::stdin()
            .read_to_string(&mut body)
            .context("Failed to read request from stdin")?;
        return Ok(body);
    }
    std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input))
}

pub fn execute(args: OptimizeArgs, mut config: ReqoptConfig) -> Result<i32> {
    if let Some(database) = args.database {
        config.set_database(database);
    }

    let Some(platform_version) = args
        .platform_version
        .or_else(|| config.default_platform_version.clone())
    else {
        bail!("No platform version given; pass --platform-version or set default-platform-version");
    };

    let request = OptimizeRequest::from_json(&read_payload(&args.input)?)?;

    let registry = crate::open_registry(&config.database_path())?;
    let filter = PlatformFilter::with_rules(&platform_version, &config.conditional_rules()?);
    let optimizer = RequirementOptimizer::new(&registry, filter).with_minimum_stability(config.minimum_stability()?);

    let optimized = optimizer.optimize(&request)?;
    log::info!(
        "Reduced {} requested packages to {} requirements",
        request.install.len() + request.installed.as_ref().map_or(0, |i| i.len()),
        optimized.len()
    );

    println!("{}", serde_json::to_string_pretty(&optimized)?);
    Ok(0)
}
