mod config;
mod import;
mod optimize;
mod server;

use config::ReqoptConfig;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use reqopt::SqliteRegistry;
use server::ApiContext;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "reqopt")]
#[command(about = "Reduce Composer install requests to their top-level requirements")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: reqopt.toml, searched upward)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the optimization API over HTTP
    Serve {
        /// Address to listen on
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// SQLite package store
        #[arg(long)]
        database: Option<PathBuf>,
    },

    /// Optimize one request read from a file or stdin
    Optimize(optimize::OptimizeArgs),

    /// Import package metadata dumps into the store
    Import(import::ImportArgs),
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();
}

fn load_config(path: Option<&Path>) -> Result<ReqoptConfig> {
    let mut config = match path {
        Some(path) => ReqoptConfig::load_file(path)?,
        None => ReqoptConfig::load_from_cwd()?.unwrap_or_default(),
    };
    config.apply_env()?;
    Ok(config)
}

pub(crate) fn open_registry(path: &Path) -> Result<SqliteRegistry> {
    log::debug!("Opening package store {}", path.display());
    SqliteRegistry::open(path).with_context(|| format!("Failed to open package store {}", path.display()))
}

fn run_server(config: &ReqoptConfig) -> Result<i32> {
    let registry = open_registry(&config.database_path())?;
    let ctx = ApiContext {
        registry: &registry,
        rules: config.conditional_rules()?,
        default_platform_version: config.default_platform_version.clone(),
        minimum_stability: config.minimum_stability()?,
    };

    server::run(&config.server.host, config.server.port, &ctx)?;
    Ok(0)
}

fn run() -> Result<i32> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = load_config(args.config.as_deref())?;

    match args.command {
        Commands::Serve { host, port, database } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(database) = database {
                config.set_database(database);
            }
            run_server(&config)
        }
        Commands::Optimize(args) => optimize::execute(args, config),
        Commands::Import(args) => import::execute(args, config),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("Error: {}", e);
            for cause in e.chain().skip(1) {
                eprintln!("  Caused by: {}", cause);
            }
            ExitCode::FAILURE
        }
    }
}
