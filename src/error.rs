//! Error handling module for authconf
//!
//! `AuthconfError` carries individual failures; `ExitStatus` is the single
//! worst-class summary a run reports to its caller as the process exit code.

use std::path::PathBuf;
use thiserror::Error;

use crate::settings::artifact::Artifact;

/// Main error type for authconf
#[derive(Error, Debug)]
pub enum AuthconfError {
    /// IO errors (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad invocation
    #[error("Usage error: {0}")]
    Usage(String),

    /// Write requested without the required privilege
    #[error("Privilege error: {0}")]
    Privilege(String),

    /// LDAP CA certificate could not be fetched or stored
    #[error("CA certificate error: {0}")]
    CaCert(String),

    /// An artifact could not be written
    #[error("Failed to write {artifact} ({}): {source}", path.display())]
    Write {
        artifact: Artifact,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Domain join tooling failed
    #[error("Join error: {0}")]
    Join(String),

    /// Backup archive errors
    #[error("Backup error: {0}")]
    Backup(String),

    /// Tool configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// External command errors
    #[error("Command failed: {0}")]
    Command(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// General errors (catch-all for edge cases)
    #[error("{0}")]
    General(String),
}

/// Result type alias for authconf operations
pub type Result<T> = std::result::Result<T, AuthconfError>;

impl AuthconfError {
    /// Create a usage error
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Create a privilege error
    pub fn privilege(msg: impl Into<String>) -> Self {
        Self::Privilege(msg.into())
    }

    /// Create a CA certificate error
    pub fn cacert(msg: impl Into<String>) -> Self {
        Self::CaCert(msg.into())
    }

    /// Create a join error
    pub fn join(msg: impl Into<String>) -> Self {
        Self::Join(msg.into())
    }

    /// Create a backup error
    pub fn backup(msg: impl Into<String>) -> Self {
        Self::Backup(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a command error
    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }

    /// Create a general error
    pub fn general(msg: impl Into<String>) -> Self {
        Self::General(msg.into())
    }

    /// Exit status class this error belongs to when it ends a run.
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            Self::Usage(_) | Self::Config(_) => ExitStatus::Usage,
            Self::Privilege(_) => ExitStatus::Privilege,
            Self::CaCert(_) => ExitStatus::CaCert,
            Self::Write { .. } => ExitStatus::WriteChanged,
            Self::Join(_) => ExitStatus::Join,
            _ => ExitStatus::Failure,
        }
    }
}

/// Process exit status of one run
///
/// Codes are stable for scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ExitStatus {
    #[default]
    Success = 0,
    /// Backup or restore reported failure
    Failure = 1,
    Usage = 2,
    Validation = 3,
    CaCert = 4,
    /// Failure while rewriting every artifact
    WriteAll = 5,
    /// Failure while rewriting changed artifacts
    WriteChanged = 6,
    Join = 7,
    Privilege = 8,
}

impl ExitStatus {
    /// Numeric process exit code
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Rank used to pick the worst of two statuses.
    ///
    /// Usage and privilege errors abort a run before anything else can
    /// be recorded, so they outrank the accumulated classes.
    const fn severity(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Validation => 2,
            Self::CaCert => 3,
            Self::WriteAll => 4,
            Self::WriteChanged => 5,
            Self::Join => 6,
            Self::Usage => 7,
            Self::Privilege => 8,
        }
    }

    /// The more severe of `self` and `other`.
    pub fn worst(self, other: Self) -> Self {
        if other.severity() > self.severity() { other } else { self }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        std::process::ExitCode::from(status.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthconfError::cacert("ldap.example.com returned 404");
        assert_eq!(err.to_string(), "CA certificate error: ldap.example.com returned 404");

        let err = AuthconfError::usage("unexpected argument");
        assert_eq!(err.to_string(), "Usage error: unexpected argument");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AuthconfError = io_err.into();
        assert!(matches!(err, AuthconfError::Io(_)));
    }

    #[test]
    fn test_write_error_names_artifact() {
        let err = AuthconfError::Write {
            artifact: Artifact::Krb5,
            path: PathBuf::from("/etc/krb5.conf"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("krb5"));
        assert!(msg.contains("/etc/krb5.conf"));
        assert_eq!(err.exit_status(), ExitStatus::WriteChanged);
    }

    #[test]
    fn test_exit_codes_are_stable() {
        assert_eq!(ExitStatus::Success.code(), 0);
        assert_eq!(ExitStatus::Usage.code(), 2);
        assert_eq!(ExitStatus::Validation.code(), 3);
        assert_eq!(ExitStatus::CaCert.code(), 4);
        assert_eq!(ExitStatus::WriteAll.code(), 5);
        assert_eq!(ExitStatus::WriteChanged.code(), 6);
        assert_eq!(ExitStatus::Join.code(), 7);
        assert_eq!(ExitStatus::Privilege.code(), 8);
    }

    #[test]
    fn test_worst_keeps_most_severe() {
        let status = ExitStatus::Success
            .worst(ExitStatus::Join)
            .worst(ExitStatus::Validation)
            .worst(ExitStatus::CaCert);
        assert_eq!(status, ExitStatus::Join);
        assert_eq!(ExitStatus::Validation.worst(ExitStatus::Success), ExitStatus::Validation);
    }
}
