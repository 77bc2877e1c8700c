//! download command - Mirror a whole bucket into `./<bucket>/`

use std::path::Path;

use ferry_core::BatchScheduler;

use super::{Command, report_summary};
use crate::exit_code::ExitCode;
use crate::output::Formatter;
use crate::progress::TransferProgress;

pub async fn execute(scheduler: &BatchScheduler, bucket: &str, formatter: &Formatter) -> ExitCode {
    let progress = TransferProgress::new(formatter);
    // Paths are relative to the working directory
    let result = scheduler
        .run_download_bucket(bucket, Path::new(""), &progress)
        .await;
    progress.finish();

    match result {
        Ok(summary) => report_summary(formatter, Command::Download, bucket, &summary),
        Err(e) => {
            formatter.error(&format!("Download of {bucket} failed: {e}"));
            ExitCode::from_error(&e)
        }
    }
}
