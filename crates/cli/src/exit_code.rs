//! Process exit codes
//!
//! Scripts can rely on these values staying stable.

use ferry_core::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    /// Unclassified failure, including runs where some items failed
    GeneralError = 1,
    /// Bad flags, unknown command, unusable destination
    UsageError = 2,
    /// Storage endpoint unreachable or rejected the request
    NetworkError = 3,
    /// Local file or remote object does not exist
    NotFound = 5,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Pick the exit code that best describes `error`
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::InvalidArgument(_) => ExitCode::UsageError,
            Error::StorageUnavailable(_) => ExitCode::NetworkError,
            Error::LocalFileNotFound { .. } | Error::ObjectNotFound { .. } => ExitCode::NotFound,
            Error::LocalWriteFailed { .. } | Error::Config(_) | Error::Io(_) => {
                ExitCode::GeneralError
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::GeneralError.as_i32(), 1);
        assert_eq!(ExitCode::UsageError.as_i32(), 2);
        assert_eq!(ExitCode::NetworkError.as_i32(), 3);
        assert_eq!(ExitCode::NotFound.as_i32(), 5);
    }

    #[test]
    fn test_from_error() {
        assert_eq!(
            ExitCode::from_error(&Error::InvalidArgument("bad".to_string())),
            ExitCode::UsageError
        );
        assert_eq!(
            ExitCode::from_error(&Error::StorageUnavailable("down".to_string())),
            ExitCode::NetworkError
        );
        assert_eq!(
            ExitCode::from_error(&Error::ObjectNotFound {
                bucket: "b".to_string(),
                key: "k".to_string(),
            }),
            ExitCode::NotFound
        );
        assert_eq!(
            ExitCode::from_error(&Error::Config("broken".to_string())),
            ExitCode::GeneralError
        );
    }
}
