//! polar-host: load policies and run queries against them.
//!
//! # Usage
//!
//! ```text
//! polar-host rules.polar -q 'allow(x, "read", y)'
//! polar-host --config bridge.yaml
//! RUST_LOG=polar_host_core=debug polar-host rules.polar
//! ```
//!
//! Without `-q`, queries are read from stdin one per line.

mod repl;

use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use polar_host_core::{config, ClassRegistry, Polar};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use repl::{CliError, InputDebugger, SharedInput};

#[derive(Parser, Debug)]
#[command(name = "polar-host")]
#[command(about = "Load rule policies and query them against host classes")]
struct Cli {
    /// YAML bridge config: policies, record classes, debug prompts
    #[arg(long)]
    config: Option<PathBuf>,

    /// Policy files (.pol or .polar), loaded after any from the config
    policies: Vec<PathBuf>,

    /// Run this query and exit; may be repeated
    #[arg(short, long = "query")]
    query: Vec<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!(error = %e, "polar-host failed");
        eprintln!("polar-host: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let classes = ClassRegistry::shared();
    let config = cli.config.as_deref().map(config::load).transpose()?;
    let mut polar = match &config {
        Some(config) => Polar::from_config(config, classes)?,
        None => Polar::new(classes),
    };
    for path in &cli.policies {
        polar.load_file(path)?;
    }
    info!(queued = polar.queued(), "loading policies");
    polar.load_queued()?;

    if cli.query.is_empty() {
        // Debug prompts read from the same input as the query prompt.
        let input = SharedInput::new(BufReader::new(io::stdin()));
        if config.as_ref().map_or(true, |c| c.debug) {
            polar.set_debug_hook(Box::new(InputDebugger::new(input.clone(), io::stdout())));
        }
        return repl::repl(&mut polar, &input, &mut io::stdout());
    }

    let mut out = io::stdout();
    for query in &cli.query {
        repl::run_query(&mut polar, query, &mut out)?;
    }
    Ok(())
}
