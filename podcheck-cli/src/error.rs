//! CLI-specific error types and exit code mapping

use podcheck_core::error::{PodcheckError, WorkloadError};
use podcheck_harness::HarnessError;

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// Cannot connect to the Docker daemon.
    #[error("daemon not reachable: {0}")]
    DaemonUnavailable(String),

    /// One or more cases (or a `verify` input) did not pass.
    #[error("verification failed: {0}")]
    VerificationFailed(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from podcheck-core.
    #[error("{0}")]
    Core(#[from] PodcheckError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                     |
    /// |------|-----------------------------|
    /// | 0    | Success                     |
    /// | 1    | General / command error     |
    /// | 2    | Configuration error         |
    /// | 3    | Daemon unreachable          |
    /// | 5    | Verification failed         |
    /// | 10   | IO error                    |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(PodcheckError::Config(_)) => 2,
            Self::DaemonUnavailable(_) => 3,
            Self::VerificationFailed(_) => 5,
            Self::Io(_) | Self::Core(PodcheckError::Io(_)) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Core(_) => 1,
        }
    }
}

/// Harness errors are classified through the core error type.
impl From<HarnessError> for CliError {
    fn from(e: HarnessError) -> Self {
        match PodcheckError::from(e) {
            PodcheckError::Workload(WorkloadError::Backend(msg)) => Self::DaemonUnavailable(msg),
            other => Self::Core(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podcheck_core::error::ConfigError;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Command("x".to_owned()).exit_code(), 1);
        assert_eq!(CliError::Config("x".to_owned()).exit_code(), 2);
        assert_eq!(CliError::DaemonUnavailable("x".to_owned()).exit_code(), 3);
        assert_eq!(CliError::VerificationFailed("x".to_owned()).exit_code(), 5);
        assert_eq!(
            CliError::Io(std::io::Error::other("disk")).exit_code(),
            10
        );
    }

    #[test]
    fn test_core_config_error_is_config_exit_code() {
        let err = CliError::from(PodcheckError::Config(ConfigError::FileNotFound {
            path: "podcheck.toml".to_owned(),
        }));
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("podcheck.toml"));
    }

    #[test]
    fn test_harness_error_mapping() {
        let err = CliError::from(HarnessError::Connection("refused".to_owned()));
        assert!(matches!(err, CliError::DaemonUnavailable(_)));

        assert_eq!(err.exit_code(), 3);

        let err = CliError::from(HarnessError::InvalidPattern {
            pattern: "re:(".to_owned(),
            reason: "unclosed group".to_owned(),
        });
        assert!(matches!(err, CliError::Core(PodcheckError::Config(_))));
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("re:("));

        let err = CliError::from(HarnessError::CaseLoad {
            path: "cases.toml".to_owned(),
            reason: "no [[case]] entries".to_owned(),
        });
        assert_eq!(err.exit_code(), 2);

        let err = CliError::from(HarnessError::UnitNotFound("abc".to_owned()));
        assert!(matches!(
            err,
            CliError::Core(PodcheckError::Workload(WorkloadError::NotFound(_)))
        ));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_json_error_converts() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = CliError::from(json_err);
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().starts_with("json output error"));
    }
}
