//! upload command - Upload a local directory tree
//!
//! Keys are the file paths relative to the parent of the source directory,
//! so `photos/2024/a.jpg` lands at key `photos/2024/a.jpg`.

use std::path::Path;

use ferry_core::BatchScheduler;

use super::{Command, report_summary};
use crate::exit_code::ExitCode;
use crate::output::Formatter;
use crate::progress::TransferProgress;

pub async fn execute(
    scheduler: &BatchScheduler,
    src: &str,
    bucket: &str,
    formatter: &Formatter,
) -> ExitCode {
    let progress = TransferProgress::new(formatter);
    let result = scheduler.run_upload(Path::new(src), bucket, &progress).await;
    progress.finish();

    match result {
        Ok(summary) => report_summary(formatter, Command::Upload, bucket, &summary),
        Err(e) => {
            formatter.error(&format!("Upload to {bucket} failed: {e}"));
            ExitCode::from_error(&e)
        }
    }
}
