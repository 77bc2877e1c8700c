//! get command - Fetch a single object into a directory

use std::path::Path;

use ferry_core::BatchScheduler;
use serde::Serialize;

use crate::exit_code::ExitCode;
use crate::output::Formatter;
use crate::progress::describe_success;

#[derive(Debug, Serialize)]
struct GetOutput {
    bucket: String,
    key: String,
    path: String,
    size_bytes: u64,
    size_human: String,
}

pub async fn execute(
    scheduler: &BatchScheduler,
    key: &str,
    dest_dir: &Path,
    bucket: &str,
    formatter: &Formatter,
) -> ExitCode {
    let outcome = match scheduler.run_download_one(key, dest_dir, bucket).await {
        Ok(o) => o,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    match &outcome.result {
        Ok(bytes) => {
            if formatter.is_json() {
                formatter.json(&GetOutput {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    path: outcome.item.local_path().display().to_string(),
                    size_bytes: *bytes,
                    size_human: humansize::format_size(*bytes, humansize::BINARY),
                });
            } else {
                formatter.println(&describe_success(formatter, &outcome.item));
            }
            ExitCode::Success
        }
        Err(e) => {
            formatter.error(&format!("Failed to get {key}: {e}"));
            ExitCode::from_error(e)
        }
    }
}
