//! pkgcov: per-package coverage for a whole project
//!
//! ## Usage
//!
//! ```bash
//! pkgcov                          # Test every package
//! pkgcov -e example.com/gen -p    # Skip a package, show progress
//! pkgcov --mode atomic -f json    # Atomic counters, JSON summary
//! ```

use clap::Parser;
use pkgcov::{logging, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = cli.to_config();
    logging::init(config.verbosity);

    match pkgcov::run(&config) {
        Ok((summary, line)) => {
            println!("{line}");
            if summary.passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("error: {}: {e}", e.stage());
            ExitCode::from(e.exit_code())
        }
    }
}
