//! External compositor control process
//!
//! The core only talks to `hyprctl` through [`HyprctlExecutor`]: `query`
//! waits for output, `dispatch` succeeds once the process has started.
//! Neither is ever retried; only the connectivity probe polls.

use std::io::{self, Read};
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

use crate::constants::{hyprctl, reconnect};

#[derive(Debug, Error)]
pub enum HyprctlError {
    #[error("failed to start `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("`{command}` exited unsuccessfully ({status}): {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("`{command}` timed out after {secs}s")]
    Timeout { command: String, secs: u64 },
    #[error("failed to wait for `{command}`")]
    Wait {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("`{command}` produced non-UTF-8 output")]
    NonUtf8 { command: String },
}

pub trait HyprctlExecutor {
    /// Run to completion and return stdout
    fn query(&self, args: &[&str]) -> Result<String, HyprctlError>;

    /// Fire and forget; Ok means the process started
    fn dispatch(&self, args: &[&str]) -> Result<(), HyprctlError>;
}

fn describe(args: &[&str]) -> String {
    let mut command = hyprctl::BINARY.to_string();
    for arg in args {
        command.push(' ');
        command.push_str(arg);
    }
    command
}

/// Runs the real `hyprctl` binary
#[derive(Debug, Clone)]
pub struct Hyprctl {
    timeout: Duration,
}

impl Hyprctl {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

impl Default for Hyprctl {
    fn default() -> Self {
        Self::new(hyprctl::DEFAULT_TIMEOUT_SECS)
    }
}

/// Read a child pipe to EOF on its own thread
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// Run `command` to completion within `timeout`, capturing stdout and stderr
fn run_captured(mut command: Command, description: &str, timeout: Duration) -> Result<Output, HyprctlError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| HyprctlError::Spawn {
            command: description.to_string(),
            source,
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(HyprctlError::Timeout {
                command: description.to_string(),
                secs: timeout.as_secs(),
            });
        }
        Err(source) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(HyprctlError::Wait {
                command: description.to_string(),
                source,
            });
        }
    };

    Ok(Output {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

impl HyprctlExecutor for Hyprctl {
    fn query(&self, args: &[&str]) -> Result<String, HyprctlError> {
        let command = describe(args);
        debug!(command = %command, "Running query");

        let mut process = Command::new(hyprctl::BINARY);
        process.args(args);
        let output = run_captured(process, &command, self.timeout)?;
        if !output.status.success() {
            return Err(HyprctlError::Failed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| HyprctlError::NonUtf8 { command })
    }

    fn dispatch(&self, args: &[&str]) -> Result<(), HyprctlError> {
        let command = describe(args);
        info!(command = %command, "Dispatching");

        let mut child = Command::new(hyprctl::BINARY)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| HyprctlError::Spawn {
                command: command.clone(),
                source,
            })?;

        // Started is success; reap it if it finishes in time so the exit
        // status at least shows up in the log
        match child.wait_timeout(self.timeout) {
            Ok(Some(status)) if !status.success() => {
                warn!(command = %command, status = %status, "Dispatched command exited unsuccessfully");
            }
            Ok(Some(_)) => {}
            Ok(None) => debug!(command = %command, "Dispatched command still running"),
            Err(e) => debug!(command = %command, error = %e, "Could not wait for dispatched command"),
        }
        Ok(())
    }
}

/// Whether the compositor answered the last probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    Connected,
    #[default]
    Disconnected,
}

/// Single `hyprctl version` probe
pub fn probe(executor: &dyn HyprctlExecutor) -> Connectivity {
    match executor.query(&[hyprctl::VERSION]) {
        Ok(_) => Connectivity::Connected,
        Err(e) => {
            debug!(error = %e, "Connectivity probe failed");
            Connectivity::Disconnected
        }
    }
}

/// Bounded reconnect policy
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: reconnect::MAX_ATTEMPTS,
            interval: Duration::from_millis(reconnect::INTERVAL_MS),
        }
    }
}

/// Probe up to `policy.max_attempts` times, sleeping `policy.interval`
/// between attempts. Returns the final state.
pub fn wait_until_reachable(executor: &dyn HyprctlExecutor, policy: ReconnectPolicy) -> Connectivity {
    for attempt in 1..=policy.max_attempts {
        if probe(executor) == Connectivity::Connected {
            info!(attempt, "Compositor reachable");
            return Connectivity::Connected;
        }
        warn!(attempt, max_attempts = policy.max_attempts, "Compositor not reachable");
        if attempt < policy.max_attempts {
            thread::sleep(policy.interval);
        }
    }
    Connectivity::Disconnected
}


#[cfg(test)]
mod tests {
    use super::fake::FakeExecutor;
    use super::*;

    fn no_wait(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts,
            interval: Duration::ZERO,
        }
    }

    #[test]
    fn test_describe_command() {
        assert_eq!(describe(&["-j", "monitors", "all"]), "hyprctl -j monitors all");
    }

    #[test]
    fn test_probe() {
        let executor = FakeExecutor::new();
        executor.respond("version", "Hyprland 0.45.0");
        assert_eq!(probe(&executor), Connectivity::Connected);
        assert_eq!(probe(&executor), Connectivity::Disconnected);
    }

    #[test]
    fn test_reconnect_stops_at_first_success() {
        let executor = FakeExecutor::new();
        executor.fail("version", "no socket").respond("version", "Hyprland");
        assert_eq!(wait_until_reachable(&executor, no_wait(3)), Connectivity::Connected);
        assert_eq!(executor.queries.borrow().len(), 2);
    }

    #[test]
    fn test_reconnect_is_bounded() {
        let executor = FakeExecutor::new();
        assert_eq!(wait_until_reachable(&executor, no_wait(3)), Connectivity::Disconnected);
        assert_eq!(executor.queries.borrow().len(), 3);
    }

    #[test]
    fn test_error_messages() {
        let err = HyprctlError::Timeout {
            command: "hyprctl -j monitors".to_string(),
            secs: 5,
        };
        assert_eq!(err.to_string(), "`hyprctl -j monitors` timed out after 5s");
    }

    #[cfg(unix)]
    fn shell(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.args(["-c", script]);
        command
    }

    #[cfg(unix)]
    #[test]
    fn test_output_larger_than_pipe_buffer() {
        let output = run_captured(
            shell("yes '{\"name\": \"DP-1\"},' | head -c 200000"),
            "sh",
            Duration::from_secs(10),
        )
        .unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout.len(), 200000);
    }

    #[cfg(unix)]
    #[test]
    fn test_stderr_is_captured_on_failure() {
        let output = run_captured(shell("echo broken >&2; exit 3"), "sh", Duration::from_secs(10)).unwrap();
        assert!(!output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stderr).trim(), "broken");
    }

    #[cfg(unix)]
    #[test]
    fn test_slow_child_times_out() {
        let err = run_captured(shell("sleep 5"), "sh", Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, HyprctlError::Timeout { .. }));
    }
}
