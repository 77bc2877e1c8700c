//! Tracing subscriber setup
//!
//! Logs go to stderr so they never mix with command output on stdout.

use anyhow::Context;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level is `debug` with `--debug`
/// and `warn` without.
pub fn init(debug: bool) -> anyhow::Result<()> {
    let default_level = if debug { "debug" } else { "warn" };
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level).context("Invalid log level")?,
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init()
        .context("Failed to install log subscriber")
}
