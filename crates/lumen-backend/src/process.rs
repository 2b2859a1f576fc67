// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared subprocess execution for CLI-driven backends.
//!
//! Output is streamed line by line while the child runs, so callers can turn
//! progress lines into notifications before the process exits.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use lumen_core::LumenError;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::progress::LineSplitter;

const READ_CHUNK: usize = 4096;

/// Callback invoked for every line the child writes to stdout or stderr.
pub type LineFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Result of a finished child process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Exit code, or `None` when the child was killed by a signal.
    pub exit_code: Option<i32>,
    /// Last non-empty stderr line, the most useful failure summary.
    pub stderr_tail: Option<String>,
    pub duration_ms: u64,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Human-readable failure reason for a non-zero exit.
    pub fn failure_message(&self, program: &str) -> String {
        match (&self.stderr_tail, self.exit_code) {
            (Some(tail), _) => tail.trim().to_string(),
            (None, Some(code)) => format!("{program} exited with status {code}"),
            (None, None) => format!("{program} was terminated by a signal"),
        }
    }
}

/// Spawn `cmd`, stream its output through `on_line`, and wait for it to exit.
///
/// The child is killed if the returned future is dropped.
pub async fn run_streaming(mut cmd: Command, on_line: LineFn) -> Result<ProcessOutput, LumenError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    let start = Instant::now();
    let mut child = cmd.spawn().map_err(|e| spawn_error(&program, e))?;

    // Read both streams in their own tasks so `child.wait()` can borrow `child`.
    let stdout_task = tokio::spawn(read_lines(child.stdout.take(), Arc::clone(&on_line)));
    let stderr_task = tokio::spawn(read_lines(child.stderr.take(), on_line));

    let status = child.wait().await?;
    let _ = stdout_task.await;
    let stderr_tail = stderr_task.await.unwrap_or_default();

    Ok(ProcessOutput {
        exit_code: status.code(),
        stderr_tail,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

fn spawn_error(program: &str, e: std::io::Error) -> LumenError {
    LumenError::Backend {
        message: format!("failed to start `{program}`: {e}"),
        os_code: e.raw_os_error(),
        source: Some(Box::new(e)),
    }
}

/// Forward each line of `stream` to `on_line`, returning the last line seen.
async fn read_lines<R: AsyncRead + Unpin>(stream: Option<R>, on_line: LineFn) -> Option<String> {
    let mut stream = stream?;
    let mut splitter = LineSplitter::new();
    let mut last = None;
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                for line in splitter.push(&String::from_utf8_lossy(&chunk[..n])) {
                    on_line(&line);
                    last = Some(line);
                }
            }
        }
    }
    if let Some(line) = splitter.finish() {
        on_line(&line);
        last = Some(line);
    }
    last
}

/// Resolve a program name the way a shell would: paths are checked directly,
/// bare names are searched on `PATH`.
pub fn find_program(program: &str) -> Option<PathBuf> {
    let path = Path::new(program);
    if path.components().count() > 1 || path.is_absolute() {
        return path.is_file().then(|| path.to_path_buf());
    }
    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::Mutex;

    fn collector() -> (LineFn, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let f: LineFn = Arc::new(move |line: &str| sink.lock().unwrap().push(line.to_string()));
        (f, lines)
    }

    #[tokio::test]
    #[serial]
    async fn streams_lines_from_both_pipes() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg("printf '1/3\\r2/3\\r3/3\\n'; echo 'warming up' >&2; echo 'last words' >&2");
        let (on_line, lines) = collector();

        let out = run_streaming(cmd, on_line).await.unwrap();
        assert!(out.success());
        assert_eq!(out.stderr_tail.as_deref(), Some("last words"));

        let lines = lines.lock().unwrap();
        for expected in ["1/3", "2/3", "3/3", "warming up", "last words"] {
            assert!(lines.iter().any(|l| l == expected), "missing {expected}: {lines:?}");
        }
    }

    #[tokio::test]
    #[serial]
    async fn non_zero_exit_reports_stderr_tail() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo 'model missing' >&2; exit 3");
        let (on_line, _) = collector();

        let out = run_streaming(cmd, on_line).await.unwrap();
        assert!(!out.success());
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.failure_message("sd"), "model missing");
    }

    #[tokio::test]
    #[serial]
    async fn missing_program_is_backend_error_with_os_code() {
        let cmd = Command::new("/definitely/not/a/real/binary");
        let (on_line, _) = collector();

        let err = run_streaming(cmd, on_line).await.unwrap_err();
        assert!(matches!(err, LumenError::Backend { .. }));
        assert_eq!(err.os_code(), Some(2));
    }

    #[test]
    fn find_program_on_path() {
        assert!(find_program("sh").is_some());
        assert!(find_program("no-such-program-lumen").is_none());
        assert!(find_program("/definitely/not/here").is_none());
    }

    #[test]
    fn failure_message_without_stderr() {
        let out = ProcessOutput {
            exit_code: Some(1),
            stderr_tail: None,
            duration_ms: 5,
        };
        assert_eq!(out.failure_message("sd"), "sd exited with status 1");
    }
}
