#[macro_use] extern crate prettytable;

use std::io;

use anyhow::anyhow;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

mod cli;
mod engine;
mod export;
mod interface;
mod model;

use cli::CommandLineArgs;
use interface::Session;
use model::Schedule;

/// Send diagnostics to stderr, keeping stdout for the schedule itself.
fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|err| anyhow!("Failed to initialize logging: {}", err))
}

fn main() -> anyhow::Result<()> {
    // Get the command-line arguments.
    let CommandLineArgs {
        output_dir,
        log_level,
    } = CommandLineArgs::from_args();

    init_logging(&log_level)?;

    let output_dir = output_dir.unwrap_or_else(export::default_export_dir);

    // A fresh day starts with one task on the sheet.
    let mut schedule = Schedule::new()?;
    schedule.add_task()?;

    let mut session = Session::new(schedule, output_dir);
    let stdin = io::stdin();
    let stdout = io::stdout();
    session.run(stdin.lock(), &mut stdout.lock())
}
