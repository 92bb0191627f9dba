//! Plugin invocation
//!
//! The tester only needs one thing from a plugin run: the classified
//! outcome. [`PluginInvoker`] is the seam between the runner and the
//! operating system so the runner can be exercised without processes.

mod process;

pub use process::ProcessInvoker;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::common::{Error, Result};

/// How the encoded input reaches the plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassMode {
    /// As the sole command line argument
    Argument,
    /// In the named environment variable
    Env(String),
}

/// Why a plugin run did not complete successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitInfo {
    /// Exited with a non-zero code
    Code(i32),
    /// Terminated by a signal
    Signal,
    /// Could not be started
    SpawnFailed(String),
    /// Started, but waiting for it failed
    WaitFailed(String),
    /// Killed after exceeding the time limit
    TimedOut(Duration),
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitInfo::Code(code) => write!(f, "exit status {code}"),
            ExitInfo::Signal => f.write_str("terminated by signal"),
            ExitInfo::SpawnFailed(reason) => write!(f, "failed to start: {reason}"),
            ExitInfo::WaitFailed(reason) => write!(f, "failed while waiting: {reason}"),
            ExitInfo::TimedOut(limit) => write!(f, "timed out after {limit:?}"),
        }
    }
}

/// Classified result of one plugin run
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Success {
        output: Value,
        duration: Duration,
    },
    ProcessFailure {
        exit: ExitInfo,
        raw_output: String,
        duration: Duration,
    },
    DecodeFailure {
        raw_output: String,
        cause: String,
        duration: Duration,
    },
}

impl ExecutionOutcome {
    pub fn duration(&self) -> Duration {
        match self {
            ExecutionOutcome::Success { duration, .. }
            | ExecutionOutcome::ProcessFailure { duration, .. }
            | ExecutionOutcome::DecodeFailure { duration, .. } => *duration,
        }
    }

    /// Classify captured process output
    ///
    /// The plugin's output is stdout followed by stderr, and that combined
    /// text is what must decode as JSON.
    pub fn classify(
        exit: Option<ExitInfo>,
        stdout: &[u8],
        stderr: &[u8],
        duration: Duration,
    ) -> Self {
        let combined = [stdout, stderr].concat();
        let raw_output = || String::from_utf8_lossy(&combined).into_owned();

        if let Some(exit) = exit {
            return ExecutionOutcome::ProcessFailure {
                exit,
                raw_output: raw_output(),
                duration,
            };
        }

        match serde_json::from_slice(&combined) {
            Ok(output) => ExecutionOutcome::Success { output, duration },
            Err(e) => ExecutionOutcome::DecodeFailure {
                raw_output: raw_output(),
                cause: e.to_string(),
                duration,
            },
        }
    }
}

/// Runs a plugin with an encoded input
#[async_trait]
pub trait PluginInvoker: Send + Sync {
    /// Run `plugin` once with `payload` (unencoded JSON bytes)
    async fn invoke(&self, plugin: &Path, payload: &[u8], mode: &PassMode) -> ExecutionOutcome;
}

/// Resolve a plugin reference to an executable path
///
/// Existing paths are used as given; bare names are looked up on `PATH`.
pub fn resolve_plugin(reference: &str) -> Result<PathBuf> {
    let path = Path::new(reference);
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if path.components().count() == 1 {
        if let Ok(found) = which::which(reference) {
            return Ok(found);
        }
    }
    Err(Error::PluginNotFound(reference.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TICK: Duration = Duration::from_millis(3);

    #[test]
    fn test_classify_success() {
        let outcome = ExecutionOutcome::classify(None, br#"{"result":"ok"}"#, b"", TICK);
        match outcome {
            ExecutionOutcome::Success { output, duration } => {
                assert_eq!(output, json!({"result": "ok"}));
                assert_eq!(duration, TICK);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_non_zero_exit_wins_over_valid_json() {
        let outcome =
            ExecutionOutcome::classify(Some(ExitInfo::Code(1)), br#"{"result":"ok"}"#, b"boom", TICK);
        match outcome {
            ExecutionOutcome::ProcessFailure {
                exit, raw_output, ..
            } => {
                assert_eq!(exit, ExitInfo::Code(1));
                assert_eq!(raw_output, r#"{"result":"ok"}boom"#);
            }
            other => panic!("expected process failure, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_decodes_stderr_with_stdout() {
        let outcome = ExecutionOutcome::classify(None, br#"{"result":"ok"}"#, b"warning", TICK);
        match outcome {
            ExecutionOutcome::DecodeFailure { raw_output, .. } => {
                assert_eq!(raw_output, r#"{"result":"ok"}warning"#);
            }
            other => panic!("expected decode failure, got {other:?}"),
        }

        let split = ExecutionOutcome::classify(None, br#"{"result":"#, br#""ok"}"#, TICK);
        assert!(matches!(split, ExecutionOutcome::Success { .. }));
    }

    #[test]
    fn test_classify_garbage_is_decode_failure() {
        let outcome = ExecutionOutcome::classify(None, b"Traceback (most recent", b"", TICK);
        assert!(matches!(
            outcome,
            ExecutionOutcome::DecodeFailure { ref raw_output, .. }
                if raw_output == "Traceback (most recent"
        ));
    }

    #[test]
    fn test_exit_info_display() {
        assert_eq!(ExitInfo::Code(2).to_string(), "exit status 2");
        assert_eq!(
            ExitInfo::WaitFailed("broken pipe".into()).to_string(),
            "failed while waiting: broken pipe"
        );
        assert!(ExitInfo::TimedOut(Duration::from_secs(1))
            .to_string()
            .contains("timed out"));
    }

    #[test]
    fn test_resolve_missing_plugin() {
        assert!(matches!(
            resolve_plugin("/nonexistent/plugin.py"),
            Err(Error::PluginNotFound(_))
        ));
        assert!(matches!(
            resolve_plugin("no-such-watts-plugin-anywhere"),
            Err(Error::PluginNotFound(_))
        ));
    }

    #[test]
    fn test_resolve_existing_path() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let reference = file.path().to_str().unwrap();
        assert_eq!(resolve_plugin(reference).unwrap(), file.path());
    }
}
