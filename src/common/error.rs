//! Error types for the plugin tester
//!
//! Every error belongs to one of the exit categories scripts rely on, so
//! the variants are grouped by the category they map to.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Process exit categories
///
/// The numeric values are part of the command line contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success = 0,
    /// The plugin violated its contract (schema, decoding, expectations)
    PluginError = 1,
    /// The plugin could not be executed or exited unsuccessfully
    PluginExecutionError = 2,
    /// A defect in the tester itself
    InternalError = 3,
    /// Bad input from the user
    UserError = 4,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Main error type for the plugin tester
#[derive(Error, Debug)]
pub enum Error {
    // === User Input Errors ===
    #[error("Invalid plugin action '{0}'. Supported actions: parameter, request, revoke")]
    InvalidAction(String),

    #[error("Unsupported watts_version '{0}'")]
    UnsupportedVersion(String),

    #[error("No schema for watts_version {version} and action '{action}'")]
    UnknownSchema { version: String, action: String },

    #[error("Malformed override from {source_name}: {reason}")]
    MalformedOverride { source_name: String, reason: String },

    #[error("Could not find configuration parameters for '{service}' in '{path}'")]
    ConfigExtraction { service: String, path: String },

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    #[error("Plugin '{0}' not found")]
    PluginNotFound(String),

    #[error("Invalid plugin input at {path}: {cause}")]
    InvalidPluginInput { path: String, cause: String },

    #[error("Invalid test suite: {0}")]
    InvalidSuite(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === Plugin Errors ===
    #[error("Error executing the plugin: {0}")]
    PluginExecution(String),

    #[error("Error processing the output of the plugin: {0}")]
    PluginOutput(String),

    // === Internal Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a malformed override error
    pub fn malformed_override(source_name: &str, reason: impl ToString) -> Self {
        Self::MalformedOverride {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a file read error
    pub fn file_read(path: &std::path::Path, error: impl ToString) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// The exit category this error is reported under
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            Error::InvalidAction(_)
            | Error::UnsupportedVersion(_)
            | Error::UnknownSchema { .. }
            | Error::MalformedOverride { .. }
            | Error::ConfigExtraction { .. }
            | Error::MissingInput(_)
            | Error::FileRead { .. }
            | Error::PluginNotFound(_)
            | Error::InvalidPluginInput { .. }
            | Error::InvalidSuite(_)
            | Error::ConfigParse(_) => ExitStatus::UserError,
            Error::PluginExecution(_) => ExitStatus::PluginExecutionError,
            Error::PluginOutput(_) => ExitStatus::PluginError,
            Error::Io(_) | Error::Json(_) | Error::Internal(_) => ExitStatus::InternalError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let codes = [
            ExitStatus::Success.code(),
            ExitStatus::PluginError.code(),
            ExitStatus::PluginExecutionError.code(),
            ExitStatus::InternalError.code(),
            ExitStatus::UserError.code(),
        ];
        assert_eq!(codes, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            Error::InvalidAction("foo".into()).exit_status(),
            ExitStatus::UserError
        );
        assert_eq!(
            Error::ConfigExtraction {
                service: "x".into(),
                path: "watts.conf".into()
            }
            .exit_status(),
            ExitStatus::UserError
        );
        assert_eq!(
            Error::PluginExecution("exit status 1".into()).exit_status(),
            ExitStatus::PluginExecutionError
        );
        assert_eq!(
            Error::PluginOutput("expected value".into()).exit_status(),
            ExitStatus::PluginError
        );
        assert_eq!(
            Error::Internal("merge".into()).exit_status(),
            ExitStatus::InternalError
        );
    }

    #[test]
    fn test_invalid_action_message_lists_actions() {
        let msg = Error::InvalidAction("foo".into()).to_string();
        assert!(msg.contains("'foo'"));
        assert!(msg.contains("parameter, request, revoke"));
    }
}
