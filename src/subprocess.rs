//! Bounded subprocess execution.
//!
//! Trimmed from the teacher's `sandbox::common::wait_with_timeout`: this
//! guardian never runs untrusted payloads itself, only inspects them with a
//! couple of well-known read-only commands (`git ls-files`, `file -b`), so
//! the memory-limit enforcement half of the original is dropped — only the
//! timeout-and-kill loop and the background-thread output draining (to avoid
//! a pipe deadlock on large output) survive.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{GuardError, Result};

pub struct SubprocessOutput {
    pub stdout: String,
    pub success: bool,
}

/// Run `program` with `args` in `cwd`, killing it if it runs past `timeout`.
/// Returns `Err` only for process-spawn failures; a timeout or non-zero exit
/// is reported via `SubprocessOutput::success = false`, not an error — the
/// caller's policy is to treat "not observed" the same as "didn't match".
pub fn run_with_timeout(program: &str, args: &[&str], cwd: &Path, timeout: Duration) -> Result<SubprocessOutput> {
    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| GuardError::Subprocess(e.to_string()))?;

    wait_with_timeout(&mut child, timeout)
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<SubprocessOutput> {
    let start = Instant::now();
    let check_interval = Duration::from_millis(20);

    let stdout_handle = child.stdout.take().map(|mut out| {
        thread::spawn(move || {
            let mut s = String::new();
            let _ = out.read_to_string(&mut s);
            s
        })
    });

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let stdout = stdout_handle.map(|h| h.join().unwrap_or_default()).unwrap_or_default();
                return Ok(SubprocessOutput {
                    stdout,
                    success: status.success(),
                });
            }
            Ok(None) => {}
            Err(e) => {
                if let Some(h) = stdout_handle {
                    let _ = h.join();
                }
                return Err(GuardError::Subprocess(e.to_string()));
            }
        }

        if start.elapsed() > timeout {
            let _ = child.kill();
            let _ = child.wait();
            if let Some(h) = stdout_handle {
                let _ = h.join();
            }
            return Ok(SubprocessOutput {
                stdout: String::new(),
                success: false,
            });
        }

        thread::sleep(check_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn true_command_reports_success() {
        let out = run_with_timeout("true", &[], Path::new("."), Duration::from_secs(2)).unwrap();
        assert!(out.success);
    }

    #[test]
    fn false_command_reports_failure() {
        let out = run_with_timeout("false", &[], Path::new("."), Duration::from_secs(2)).unwrap();
        assert!(!out.success);
    }

    #[test]
    fn missing_binary_is_spawn_error() {
        let result = run_with_timeout("definitely-not-a-real-binary-xyz", &[], Path::new("."), Duration::from_secs(1));
        assert!(result.is_err());
    }
}
