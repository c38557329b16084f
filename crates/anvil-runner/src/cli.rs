//! Command-line interface.
//!
//! - `ports`: list simulated devices
//! - `show`: connect and print the parameter table
//! - `set`: connect, write parameters, wait for acknowledgments, print the table

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::RunnerConfig;
use crate::error::RunnerResult;
use crate::report::{render_ports, DeviceReport};
use crate::runner::{Assignment, Pace, Runner};

// ============================================================================
// Arguments
// ============================================================================

/// Configure simulated Anvil devices over the framed serial protocol.
#[derive(Parser, Debug)]
#[command(name = "anvil", version, about, long_about = None, propagate_version = true)]
pub struct Cli {
    /// YAML config with `session` and `simulator` sections
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// YAML device catalog replacing the built-in devices
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Simulated response latency in milliseconds
    #[arg(long, global = true)]
    pub latency_ms: Option<u64>,

    /// Longest wait for any device exchange in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Log filter (trace, debug, info, warn, error); overrides RUST_LOG
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List simulated ports
    Ports,

    /// Connect and print the parameter table
    Show(LinkArgs),

    /// Write parameters and print the resulting table
    Set(SetArgs),
}

/// Which device to talk to.
#[derive(Args, Debug, Clone)]
pub struct LinkArgs {
    /// Port identity, e.g. ttyMock1
    #[arg(short, long)]
    pub port: String,

    /// Link baud rate (defaults to the session's default)
    #[arg(short, long)]
    pub baud: Option<u32>,
}

/// Arguments for `set`.
#[derive(Args, Debug, Clone)]
pub struct SetArgs {
    #[command(flatten)]
    pub link: LinkArgs,

    /// Parameter write, repeatable
    #[arg(long = "param", value_name = "ID=VALUE", required = true, value_parser = parse_assignment)]
    pub params: Vec<Assignment>,
}

fn parse_assignment(raw: &str) -> Result<Assignment, String> {
    raw.parse().map_err(|e: crate::RunnerError| e.to_string())
}

impl Cli {
    /// Config file (or defaults) with command-line overrides applied.
    pub fn runner_config(&self) -> RunnerResult<RunnerConfig> {
        let mut config = match &self.config {
            Some(path) => RunnerConfig::from_path(path)?,
            None => RunnerConfig::default(),
        };
        if let Some(catalog) = &self.catalog {
            config.simulator.catalog = Some(catalog.clone());
        }
        if let Some(latency_ms) = self.latency_ms {
            config.simulator.latency_ms = latency_ms;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        Ok(config)
    }
}

// ============================================================================
// Execution
// ============================================================================

/// Run the parsed command and return what should be printed.
pub fn execute<C: Pace>(cli: &Cli, config: &RunnerConfig, clock: C) -> RunnerResult<String> {
    let mut runner = Runner::new(config, clock)?;
    match &cli.command {
        Commands::Ports => render_ports(&runner.ports(), cli.json),
        Commands::Show(link) => {
            runner.connect(&link.port, link.baud)?;
            let output = render_table(&runner, cli.json)?;
            runner.disconnect()?;
            Ok(output)
        }
        Commands::Set(args) => {
            runner.connect(&args.link.port, args.link.baud)?;
            runner.apply(&args.params)?;
            let output = render_table(&runner, cli.json)?;
            runner.disconnect()?;
            Ok(output)
        }
    }
}

fn render_table<C: Pace>(runner: &Runner<C>, json: bool) -> RunnerResult<String> {
    let session = runner.session();
    let report = DeviceReport {
        port: session.connected_port().unwrap_or_default(),
        baud_rate: session.baud_rate(),
        parameters: session.parameters(),
    };
    if json {
        report.to_json()
    } else {
        Ok(report.to_text())
    }
}
