use std::process::ExitCode;

use anvil_common::SystemClock;
use anvil_runner::{execute, init_logging, Cli};
use clap::Parser;
use tracing::debug;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());
    anvil_metrics::describe_metrics();

    let result = cli.runner_config().and_then(|config| {
        debug!("Runner: {:?}", config);
        execute(&cli, &config, SystemClock::new())
    });

    match result {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
