// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Failure classification for generation errors.
//!
//! The processor asks a [`FailureClassifier`] whether a failed generation
//! should trip the disk-full circuit breaker. [`DiskFullClassifier`] treats a
//! platform error code as authoritative and falls back to message matching
//! only when no code is available, since OS messages are localised.

use std::error::Error as _;
use std::io;

use lumen_core::LumenError;

/// Error text recorded on a job that failed because storage is exhausted.
pub const DISK_FULL_MESSAGE: &str = "Disk full";

/// How a failed generation should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Record the failure and keep draining the queue.
    Transient,
    /// Record the failure and pause intake until resumed.
    DiskFull,
}

pub trait FailureClassifier: Send + Sync + 'static {
    /// Classify an error raised by the backend call itself.
    fn classify_error(&self, error: &LumenError) -> FailureClass;

    /// Classify a failure the backend reported as a message.
    fn classify_message(&self, message: &str) -> FailureClass;
}

/// Default classifier: detects storage exhaustion.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskFullClassifier;

const DISK_FULL_PHRASES: [&str; 2] = ["disk full", "no space left on device"];

/// `ENOSPC` on unix.
#[cfg(unix)]
const DISK_FULL_CODES: &[i32] = &[28];
/// `ERROR_HANDLE_DISK_FULL` and `ERROR_DISK_FULL` on Windows.
#[cfg(windows)]
const DISK_FULL_CODES: &[i32] = &[39, 112];
#[cfg(not(any(unix, windows)))]
const DISK_FULL_CODES: &[i32] = &[];

pub fn is_disk_full_code(code: i32) -> bool {
    DISK_FULL_CODES.contains(&code)
}

pub fn mentions_disk_full(message: &str) -> bool {
    let lower = message.to_lowercase();
    DISK_FULL_PHRASES.iter().any(|p| lower.contains(p))
}

fn io_kind(error: &LumenError) -> Option<io::ErrorKind> {
    match error {
        LumenError::Io(e) => Some(e.kind()),
        other => {
            let mut source = other.source();
            while let Some(e) = source {
                if let Some(io) = e.downcast_ref::<io::Error>() {
                    return Some(io.kind());
                }
                source = e.source();
            }
            None
        }
    }
}

impl FailureClassifier for DiskFullClassifier {
    fn classify_error(&self, error: &LumenError) -> FailureClass {
        if io_kind(error) == Some(io::ErrorKind::StorageFull) {
            return FailureClass::DiskFull;
        }
        if let Some(code) = error.os_code() {
            return if is_disk_full_code(code) {
                FailureClass::DiskFull
            } else {
                FailureClass::Transient
            };
        }

        // No code: check the message of every error in the chain.
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(error);
        while let Some(e) = current {
            if mentions_disk_full(&e.to_string()) {
                return FailureClass::DiskFull;
            }
            current = e.source();
        }
        FailureClass::Transient
    }

    fn classify_message(&self, message: &str) -> FailureClass {
        if mentions_disk_full(message) {
            FailureClass::DiskFull
        } else {
            FailureClass::Transient
        }
    }
}
