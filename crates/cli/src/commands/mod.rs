//! Command implementations
//!
//! Each command prints through the shared `Formatter` and maps its result to
//! an `ExitCode`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;
use ferry_core::{
    BatchScheduler, BucketLookup, Settings, StorageConfig, TransferConfig, TransferSummary,
};
use ferry_s3::S3Client;
use serde::Serialize;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

mod download;
mod get;
mod list;
mod upload;

/// Upload, download and list objects on an S3-compatible server
#[derive(Parser, Debug)]
#[command(name = "ferry", version, about)]
pub struct Cli {
    /// Access key
    #[arg(short = 'l', long, env = "FERRY_ACCESS_KEY", default_value = "")]
    pub login: String,

    /// Secret key
    #[arg(
        short = 'p',
        long,
        env = "FERRY_SECRET_KEY",
        default_value = "",
        hide_env_values = true,
        hide_default_value = true
    )]
    pub password: String,

    /// Command to run: upload, download, get or list
    #[arg(short = 'c', long, default_value = "list")]
    pub command: String,

    /// Local directory to upload, or object key to get
    #[arg(short = 's', long, default_value = ".")]
    pub src: String,

    /// Destination directory for get
    #[arg(short = 'd', long, default_value = ".")]
    pub dest: PathBuf,

    /// Bucket name
    #[arg(short = 'b', long, default_value = "mybucket")]
    pub bucket: String,

    /// Storage endpoint URL
    #[arg(long, env = "FERRY_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Signing region
    #[arg(long, env = "FERRY_REGION")]
    pub region: Option<String>,

    /// Bucket addressing style: path or dns
    #[arg(long)]
    pub bucket_lookup: Option<BucketLookup>,

    /// Maximum transfers in flight
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Download copy buffer size in bytes
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Stop admitting new transfers after the first failing wave
    #[arg(long)]
    pub fail_fast: bool,

    /// Settings file (TOML)
    #[arg(long, env = "FERRY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output JSON instead of human-readable text
    #[arg(long)]
    pub json: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Only print errors
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn output_config(&self) -> OutputConfig {
        OutputConfig {
            json: self.json,
            no_color: self.no_color,
            quiet: self.quiet,
        }
    }

    /// Connection settings; flags win over the settings file
    pub fn storage_config(&self, settings: &Settings) -> StorageConfig {
        let mut config = StorageConfig::new(&self.login, &self.password);
        if let Some(endpoint) = self.endpoint.clone().or_else(|| settings.endpoint.clone()) {
            config.endpoint = endpoint;
        }
        if let Some(region) = self.region.clone().or_else(|| settings.region.clone()) {
            config.region = region;
        }
        if let Some(lookup) = self.bucket_lookup.or(settings.bucket_lookup) {
            config.bucket_lookup = lookup;
        }
        config
    }

    pub fn transfer_config(&self, settings: &Settings) -> TransferConfig {
        let defaults = TransferConfig::default();
        TransferConfig {
            concurrency: self
                .concurrency
                .or(settings.concurrency)
                .unwrap_or(defaults.concurrency),
            chunk_size: self
                .chunk_size
                .or(settings.chunk_size)
                .unwrap_or(defaults.chunk_size),
            fail_fast: self.fail_fast,
        }
    }
}

/// The operation selected with `--command`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Upload,
    Download,
    Get,
    List,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Upload => "upload",
            Command::Download => "download",
            Command::Get => "get",
            Command::List => "list",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected `--command` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl fmt::Display for UnknownCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown command: {}", self.0)
    }
}

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(Command::Upload),
            "download" => Ok(Command::Download),
            "get" => Ok(Command::Get),
            "list" => Ok(Command::List),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

/// Resolve configuration, connect, and run the selected command
pub async fn execute(cli: Cli) -> ExitCode {
    let formatter = Formatter::new(cli.output_config());

    let command = match cli.command.parse::<Command>() {
        Ok(c) => c,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::UsageError;
        }
    };

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            formatter.error(&format!("Failed to load settings: {e}"));
            return ExitCode::from_error(&e);
        }
    };

    let transfer = cli.transfer_config(&settings);
    if let Err(e) = transfer.validate() {
        formatter.error(&e.to_string());
        return ExitCode::UsageError;
    }

    let client = match S3Client::new(&cli.storage_config(&settings)).await {
        Ok(c) => c,
        Err(e) => {
            formatter.error(&format!("Failed to create S3 client: {e}"));
            return ExitCode::from_error(&e);
        }
    };

    tracing::debug!(%command, bucket = %cli.bucket, ?transfer, "Dispatching command");
    let scheduler = BatchScheduler::new(Arc::new(client), transfer);

    match command {
        Command::Upload => upload::execute(&scheduler, &cli.src, &cli.bucket, &formatter).await,
        Command::Download => download::execute(&scheduler, &cli.bucket, &formatter).await,
        Command::Get => {
            get::execute(&scheduler, &cli.src, &cli.dest, &cli.bucket, &formatter).await
        }
        Command::List => list::execute(&scheduler, &cli.bucket, &formatter).await,
    }
}

#[derive(Debug, Serialize)]
struct SummaryOutput {
    command: &'static str,
    bucket: String,
    transferred: usize,
    failed: usize,
    bytes: u64,
    size_human: String,
    waves: usize,
    aborted: bool,
    failures: Vec<FailureOutput>,
}

#[derive(Debug, Serialize)]
struct FailureOutput {
    key: String,
    path: String,
    error: String,
}

/// Print the end-of-run summary and pick the exit code for a bulk run
fn report_summary(
    formatter: &Formatter,
    command: Command,
    bucket: &str,
    summary: &TransferSummary,
) -> ExitCode {
    let size_human = humansize::format_size(summary.bytes, humansize::BINARY);

    if formatter.is_json() {
        let failures = summary
            .failures
            .iter()
            .map(|outcome| FailureOutput {
                key: outcome.item.object_key().to_string(),
                path: outcome.item.local_path().display().to_string(),
                error: outcome.error().map(|e| e.to_string()).unwrap_or_default(),
            })
            .collect();
        formatter.json(&SummaryOutput {
            command: command.as_str(),
            bucket: bucket.to_string(),
            transferred: summary.succeeded,
            failed: summary.failures.len(),
            bytes: summary.bytes,
            size_human,
            waves: summary.waves,
            aborted: summary.aborted,
            failures,
        });
    } else {
        let line = format!(
            "{} transferred ({}), {} failed, {} wave(s)",
            summary.succeeded,
            formatter.style_size(&size_human),
            summary.failures.len(),
            summary.waves
        );
        if summary.is_success() {
            formatter.success(&line);
        } else {
            formatter.println(&line);
        }
    }

    if summary.is_success() {
        return ExitCode::Success;
    }

    match summary.first_failure().and_then(|outcome| outcome.error()) {
        Some(e) if summary.aborted => {
            formatter.error(&format!("Stopped after failure: {e}"));
            ExitCode::from_error(e)
        }
        _ => {
            formatter.error(&format!(
                "{} of {} transfers failed",
                summary.failures.len(),
                summary.total()
            ));
            ExitCode::GeneralError
        }
    }
}
