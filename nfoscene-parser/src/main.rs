//! nfoscene-parser - scene metadata plugin
//!
//! Reads the plugin invocation JSON (first argument or stdin), fills the
//! targeted scene(s) from NFO files and file names, and prints exactly one
//! `{"output", "error"}` line on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use nfoscene_common::config::{load_config, resolve_config_source, TomlConfig};
use nfoscene_parser::invocation::{PluginInput, PluginOutput};
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for nfoscene-parser
#[derive(Parser, Debug)]
#[command(name = "nfoscene-parser")]
#[command(about = "Fill catalog scenes from NFO files and file names")]
#[command(version)]
struct Args {
    /// Invocation JSON (read from stdin when omitted)
    fragment: Option<String>,

    /// Configuration file
    #[arg(short, long, env = "NFOSCENE_CONFIG")]
    config: Option<PathBuf>,

    /// Compute updates without writing to the catalog
    #[arg(long)]
    dry_run: bool,
}

fn init_tracing(config: &TomlConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn read_fragment(args: &Args) -> Result<String> {
    match &args.fragment {
        Some(fragment) => Ok(fragment.clone()),
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read plugin input from stdin")?;
            Ok(raw)
        }
    }
}

async fn run(args: &Args, config: &TomlConfig) -> Result<String> {
    let raw = read_fragment(args)?;
    let input = PluginInput::parse(&raw)?;
    let message = nfoscene_parser::run_invocation(&input, config, args.dry_run).await?;
    Ok(message)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let started = Instant::now();
    let args = Args::parse();

    let source = resolve_config_source(args.config.as_deref());
    let config = match load_config(&source) {
        Ok(config) => config,
        Err(e) => {
            println!("{}", PluginOutput::failure(e.to_string()).to_json_line());
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config);

    info!(
        "Starting nfoscene-parser v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    debug!(source = ?source, "Configuration loaded");

    let output = match run(&args, &config).await {
        Ok(message) => PluginOutput::success(message),
        Err(e) => {
            error!(error = %e, "Plugin run failed");
            PluginOutput::failure(e.to_string())
        }
    };

    debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Plugin run finished");
    println!("{}", output.to_json_line());

    if output.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
