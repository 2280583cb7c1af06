use clap::Parser;
use dialoguer::Input;
use human_panic::setup_panic;
use std::{
    env,
    io::{stdin, stdout, IsTerminal},
    process::ExitCode,
    time::Instant,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use freeciv_history_extractor::report::ReportGenerator;

/// The command line interface and interactive prompts
mod args;
use args::Args;

/// Main function. This is the entry point of the program.
///
/// # Process
///
/// 1. Reads the recording directory and report turns, from the arguments or
///    interactively when started from a terminal without arguments
/// 2. Validates the configuration against the recording
/// 3. For each report turn reconstructs the history up to it and writes the
///    report into the output directory
fn main() -> ExitCode {
    setup_panic!();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = if env::args().len() < 2 && stdin().is_terminal() {
        Args::get_from_user()
    } else {
        Args::parse()
    };
    let no_interaction = args.no_interaction;
    let config = args.into_config();
    let output_dir = config.output_dir.clone();
    let start_time = Instant::now();
    let code = match ReportGenerator::new(config) {
        Ok(generator) => {
            let written = generator.generate_reports();
            info!(
                "wrote {} files to {} in {}s",
                written.len(),
                output_dir.display(),
                start_time.elapsed().as_secs_f64()
            );
            if written.is_empty() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            ExitCode::FAILURE
        }
    };
    if stdin().is_terminal() && stdout().is_terminal() && !no_interaction {
        Input::<String>::new()
            .with_prompt("Press enter to exit")
            .allow_empty(true)
            .interact()
            .unwrap();
    }
    code
}
