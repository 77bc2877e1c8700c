//! list command - Print every object in a bucket
//!
//! Human output streams one line per object as pages arrive:
//! `<owner name> <owner id> <YYYY-MM-DD HH:MM:SS> UTC <key>`.

use ferry_core::{BatchScheduler, ObjectRecord};
use futures::{StreamExt, pin_mut};
use serde::Serialize;

use crate::exit_code::ExitCode;
use crate::output::Formatter;

#[derive(Debug, Serialize)]
struct ListOutput {
    bucket: String,
    objects: Vec<ObjectRecord>,
}

pub async fn execute(scheduler: &BatchScheduler, bucket: &str, formatter: &Formatter) -> ExitCode {
    let records = scheduler.run_list(bucket);
    pin_mut!(records);

    let mut collected = Vec::new();
    while let Some(record) = records.next().await {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                formatter.error(&format!("Failed to list {bucket}: {e}"));
                return ExitCode::from_error(&e);
            }
        };

        if formatter.is_json() {
            collected.push(record);
        } else {
            formatter.println(&format_record(formatter, &record));
        }
    }

    if formatter.is_json() {
        formatter.json(&ListOutput {
            bucket: bucket.to_string(),
            objects: collected,
        });
    }

    ExitCode::Success
}

fn format_record(formatter: &Formatter, record: &ObjectRecord) -> String {
    let date = format!("{} UTC", record.last_modified.strftime("%Y-%m-%d %H:%M:%S"));
    format!(
        "{} {} {} {}",
        formatter.style_owner(&record.owner_name),
        formatter.style_owner(&record.owner_id),
        formatter.style_date(&date),
        formatter.style_key(&record.key)
    )
}
