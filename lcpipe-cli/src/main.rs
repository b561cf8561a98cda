//! LCPipe CLI - Command-line interface
//!
//! This binary drives the checkpointed light curve extraction pipeline and
//! the read-only status monitor.

use clap::{Parser, Subcommand};

mod commands;
mod error;

#[derive(Parser)]
#[command(name = "lcpipe")]
#[command(version = lcpipe::VERSION)]
#[command(about = "Checkpointed light curve extraction from survey tiles", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an extraction job (resumes from the checkpoint if one exists)
    Run(commands::run::RunArgs),
    /// Show checkpoint progress without touching the lock
    Status(commands::status::StatusArgs),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run(args) => commands::run::run(args),
        Command::Status(args) => commands::status::run(args),
    };

    if let Err(e) = result {
        e.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
