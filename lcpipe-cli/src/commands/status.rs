//! Status command - read-only progress monitor.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::Args;

use lcpipe::monitor::StatusReport;

use crate::error::CliError;

/// Arguments for the status command.
#[derive(Args)]
pub struct StatusArgs {
    /// Output directory of the job to inspect
    #[arg(long)]
    pub output_dir: PathBuf,

    /// Keep refreshing instead of printing once
    #[arg(long)]
    pub watch: bool,

    /// Seconds between refreshes in watch mode
    #[arg(long, default_value_t = 30)]
    pub interval: u64,
}

/// Run the status command.
///
/// Never takes the checkpoint lock and never fails on a corrupt document;
/// problems show up as warning lines in the report.
pub fn run(args: StatusArgs) -> Result<(), CliError> {
    loop {
        let report = StatusReport::gather(&args.output_dir);
        if args.watch {
            // Clear screen and home the cursor between refreshes.
            print!("\x1b[2J\x1b[H");
        }
        print!("{}", report);

        if !args.watch {
            return Ok(());
        }
        thread::sleep(Duration::from_secs(args.interval));
    }
}
