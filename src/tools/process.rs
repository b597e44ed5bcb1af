//! Subprocess execution with a hard timeout.
//!
//! Used by the test runner and the registry existence checks. Output
//! pipes are drained on reader threads so a chatty child cannot deadlock
//! against a full pipe buffer; on deadline the child is killed.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// Outcome of a timed subprocess run.
#[derive(Debug)]
pub(crate) struct CommandOutput {
    /// True when the child exited with status 0.
    pub success: bool,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// True when the child was killed on deadline.
    pub timed_out: bool,
}

fn drain(stream: Option<impl Read + Send + 'static>) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut stream) = stream {
            let _ = stream.read_to_end(&mut buffer);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    })
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> (bool, bool) {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return (status.success(), false),
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return (false, true);
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(_) => return (false, false),
        }
    }
}

/// Runs a command, killing it after `timeout`.
///
/// # Errors
///
/// Returns the spawn error when the command cannot start (missing
/// binary, permission).
pub(crate) fn run_with_timeout(
    command: &mut Command,
    timeout: Duration,
) -> std::io::Result<CommandOutput> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout_handle = drain(child.stdout.take());
    let stderr_handle = drain(child.stderr.take());
    let (success, timed_out) = wait_with_deadline(&mut child, timeout);

    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();

    Ok(CommandOutput {
        success,
        stdout,
        stderr,
        timed_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captures_output() {
        let output = run_with_timeout(
            Command::new("sh").args(["-c", "echo out; echo err >&2"]),
            Duration::from_secs(5),
        )
        .expect("spawn");
        assert!(output.success);
        assert!(!output.timed_out);
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[test]
    fn test_timeout_kills_child() {
        let start = Instant::now();
        let output = run_with_timeout(
            Command::new("sleep").arg("30"),
            Duration::from_millis(200),
        )
        .expect("spawn");
        assert!(output.timed_out);
        assert!(!output.success);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_missing_binary_is_error() {
        let result = run_with_timeout(
            &mut Command::new("definitely-not-a-real-binary-xyz"),
            Duration::from_secs(1),
        );
        assert!(result.is_err());
    }
}
