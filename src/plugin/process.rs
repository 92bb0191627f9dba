//! Process-backed plugin invocation

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::{ExecutionOutcome, ExitInfo, PassMode, PluginInvoker};

/// Runs plugins as child processes under a wall-clock limit
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    timeout: Duration,
}

impl ProcessInvoker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl PluginInvoker for ProcessInvoker {
    async fn invoke(&self, plugin: &Path, payload: &[u8], mode: &PassMode) -> ExecutionOutcome {
        let encoded = STANDARD.encode(payload);

        let mut cmd = Command::new(plugin);
        match mode {
            PassMode::Argument => {
                cmd.arg(&encoded);
            }
            PassMode::Env(var) => {
                cmd.env(var, &encoded);
            }
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(plugin = %plugin.display(), ?mode, "Invoking plugin");
        let started = Instant::now();

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ExecutionOutcome::classify(
                    Some(ExitInfo::SpawnFailed(e.to_string())),
                    b"",
                    b"",
                    started.elapsed(),
                );
            }
        };

        let (stdout, stdout_reader) = capture(child.stdout.take());
        let (stderr, stderr_reader) = capture(child.stderr.take());
        let mut readers = [stdout_reader, stderr_reader];

        let run = async {
            let status = child.wait().await?;
            for reader in readers.iter_mut().flatten() {
                let _ = reader.await;
            }
            Ok::<_, io::Error>(status)
        };
        let waited = timeout(self.timeout, run).await;
        let duration = started.elapsed();

        let exit = match waited {
            Ok(Ok(status)) if status.success() => None,
            Ok(Ok(status)) => Some(match status.code() {
                Some(code) => ExitInfo::Code(code),
                None => ExitInfo::Signal,
            }),
            Ok(Err(e)) => Some(ExitInfo::WaitFailed(e.to_string())),
            Err(_) => {
                tracing::warn!(plugin = %plugin.display(), limit = ?self.timeout, "Plugin timed out");
                Some(ExitInfo::TimedOut(self.timeout))
            }
        };
        if exit.is_some() {
            // Grandchildren may still hold the pipes open
            let _ = child.start_kill();
            for reader in readers.iter().flatten() {
                reader.abort();
            }
        }

        tracing::debug!(?duration, success = exit.is_none(), "Plugin finished");
        ExecutionOutcome::classify(exit, &snapshot(&stdout), &snapshot(&stderr), duration)
    }
}

type Captured = Arc<Mutex<Vec<u8>>>;

/// Read a child pipe into a shared buffer as data arrives
fn capture<R>(pipe: Option<R>) -> (Captured, Option<JoinHandle<io::Result<()>>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buffer = Captured::default();
    let reader = pipe.map(|mut pipe| {
        let sink = Arc::clone(&buffer);
        tokio::spawn(async move {
            let mut chunk = [0u8; 4096];
            loop {
                let read = pipe.read(&mut chunk).await?;
                if read == 0 {
                    return Ok(());
                }
                sink.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(&chunk[..read]);
            }
        })
    });
    (buffer, reader)
}

fn snapshot(buffer: &Captured) -> Vec<u8> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn invoker() -> ProcessInvoker {
        ProcessInvoker::new(Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_argument_is_base64_payload() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = script(dir.path(), "echo_arg", r#"printf '{"arg":"%s"}' "$1""#);

        let outcome = invoker()
            .invoke(&plugin, br#"{"action":"parameter"}"#, &PassMode::Argument)
            .await;
        match outcome {
            ExecutionOutcome::Success { output, .. } => {
                let arg = output["arg"].as_str().unwrap();
                assert_eq!(STANDARD.decode(arg).unwrap(), br#"{"action":"parameter"}"#);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_env_mode_sets_variable_and_no_argument() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = script(
            dir.path(),
            "echo_env",
            r#"printf '{"env":"%s","argc":%d}' "$PLUGIN_INPUT" "$#""#,
        );

        let outcome = invoker()
            .invoke(&plugin, b"{}", &PassMode::Env("PLUGIN_INPUT".into()))
            .await;
        match outcome {
            ExecutionOutcome::Success { output, .. } => {
                assert_eq!(output["env"], STANDARD.encode(b"{}"));
                assert_eq!(output["argc"], 0);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_process_failure() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = script(dir.path(), "fail", "echo broken >&2\nexit 3");

        let outcome = invoker().invoke(&plugin, b"{}", &PassMode::Argument).await;
        match outcome {
            ExecutionOutcome::ProcessFailure {
                exit, raw_output, ..
            } => {
                assert_eq!(exit, ExitInfo::Code(3));
                assert!(raw_output.contains("broken"));
            }
            other => panic!("expected process failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_plugin() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = script(dir.path(), "slow", "sleep 5");

        let outcome = ProcessInvoker::new(Duration::from_millis(200))
            .invoke(&plugin, b"{}", &PassMode::Argument)
            .await;
        assert!(matches!(
            outcome,
            ExecutionOutcome::ProcessFailure {
                exit: ExitInfo::TimedOut(_),
                ..
            }
        ));
        assert!(outcome.duration() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_timeout_keeps_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = script(dir.path(), "stalls", "echo partial\necho noisy >&2\nsleep 5");

        let outcome = ProcessInvoker::new(Duration::from_millis(500))
            .invoke(&plugin, b"{}", &PassMode::Argument)
            .await;
        match outcome {
            ExecutionOutcome::ProcessFailure {
                exit: ExitInfo::TimedOut(_),
                raw_output,
                ..
            } => {
                assert!(raw_output.contains("partial"));
                assert!(raw_output.contains("noisy"));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stderr_on_success_is_decode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = script(
            dir.path(),
            "chatty",
            r#"printf '{"result":"ok"}'
echo 'deprecated option' >&2"#,
        );

        let outcome = invoker().invoke(&plugin, b"{}", &PassMode::Argument).await;
        match outcome {
            ExecutionOutcome::DecodeFailure { raw_output, .. } => {
                assert_eq!(raw_output, "{\"result\":\"ok\"}deprecated option\n");
            }
            other => panic!("expected decode failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_failure() {
        let outcome = invoker()
            .invoke(Path::new("/nonexistent/plugin"), b"{}", &PassMode::Argument)
            .await;
        assert!(matches!(
            outcome,
            ExecutionOutcome::ProcessFailure {
                exit: ExitInfo::SpawnFailed(_),
                ..
            }
        ));
    }
}
