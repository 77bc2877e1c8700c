//! ferry - move files between a local filesystem and S3-compatible storage
//!
//! Uploads directory trees, downloads whole buckets, fetches single objects
//! and lists buckets on any S3-compatible server.

use clap::Parser;

mod commands;
mod exit_code;
mod logging;
mod output;
mod progress;

use commands::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.debug) {
        eprintln!("Warning: {e:#}");
    }

    let exit_code = commands::execute(cli).await;

    std::process::exit(exit_code.as_i32());
}
