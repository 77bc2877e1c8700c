//! Work items and their outcomes

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// One unit of transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    Upload {
        local_path: PathBuf,
        object_key: String,
    },
    Download {
        object_key: String,
        local_path: PathBuf,
    },
}

impl WorkItem {
    pub fn upload(local_path: impl Into<PathBuf>, object_key: impl Into<String>) -> Self {
        WorkItem::Upload {
            local_path: local_path.into(),
            object_key: object_key.into(),
        }
    }

    pub fn download(object_key: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        WorkItem::Download {
            object_key: object_key.into(),
            local_path: local_path.into(),
        }
    }

    pub fn object_key(&self) -> &str {
        match self {
            WorkItem::Upload { object_key, .. } | WorkItem::Download { object_key, .. } => {
                object_key
            }
        }
    }

    pub fn local_path(&self) -> &Path {
        match self {
            WorkItem::Upload { local_path, .. } | WorkItem::Download { local_path, .. } => {
                local_path
            }
        }
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkItem::Upload {
                local_path,
                object_key,
            } => write!(f, "{} -> {object_key}", local_path.display()),
            WorkItem::Download {
                object_key,
                local_path,
            } => write!(f, "{object_key} -> {}", local_path.display()),
        }
    }
}

/// Terminal result of one work item
///
/// On success the result holds the number of bytes moved.
#[derive(Debug)]
pub struct TransferOutcome {
    pub item: WorkItem,
    pub result: Result<u64, Error>,
}

impl TransferOutcome {
    pub fn success(item: WorkItem, bytes: u64) -> Self {
        Self {
            item,
            result: Ok(bytes),
        }
    }

    pub fn failure(item: WorkItem, error: Error) -> Self {
        Self {
            item,
            result: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&Error> {
        self.result.as_ref().err()
    }
}

/// An enumerated entry: either work to run or an item that failed before
/// it could be handed to the executor
#[derive(Debug)]
pub(crate) enum Entry {
    Ready(WorkItem),
    Rejected(TransferOutcome),
}

/// Aggregate result of a bulk run
#[derive(Debug, Default)]
pub struct TransferSummary {
    pub succeeded: usize,
    pub bytes: u64,
    pub failures: Vec<TransferOutcome>,
    /// Number of waves the bounded-execution loop drained
    pub waves: usize,
    /// Admission stopped early because a wave contained a failure
    pub aborted: bool,
}

impl TransferSummary {
    pub(crate) fn record(&mut self, outcome: TransferOutcome) {
        match outcome.result {
            Ok(bytes) => {
                self.succeeded += 1;
                self.bytes += bytes;
            }
            Err(_) => self.failures.push(outcome),
        }
    }

    /// Total items that reached a terminal outcome
    pub fn total(&self) -> usize {
        self.succeeded + self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.aborted
    }

    /// The earliest recorded failure, if any
    pub fn first_failure(&self) -> Option<&TransferOutcome> {
        self.failures.first()
    }
}

/// Receives each outcome as soon as its transfer finishes
pub trait TransferObserver: Send + Sync {
    fn on_outcome(&self, _outcome: &TransferOutcome) {}

    /// Called after a wave of `size` items has fully drained
    fn on_wave_complete(&self, _wave: usize, _size: usize) {}
}

impl TransferObserver for () {}
