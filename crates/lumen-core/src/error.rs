// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for Lumen.

use thiserror::Error;

/// The primary error type used across all Lumen adapter traits and core operations.
#[derive(Debug, Error)]
pub enum LumenError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Generation backend errors (spawn failure, crash, unreadable output).
    ///
    /// `os_code` carries the raw platform error code when the failure
    /// originated in an OS call, e.g. `ENOSPC` while writing the image.
    #[error("backend error: {message}")]
    Backend {
        message: String,
        os_code: Option<i32>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Filesystem or process I/O errors outside the storage layer.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Post-processing errors (background removal and similar passes).
    #[error("post-processing error: {message}")]
    PostProcess {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    /// An id is already taken, in the queue or in generation history.
    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: String, id: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LumenError {
    /// Wrap any error as a storage failure.
    pub fn storage(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        LumenError::Storage {
            source: Box::new(source),
        }
    }

    /// Build a backend error without an OS code.
    pub fn backend(message: impl Into<String>) -> Self {
        LumenError::Backend {
            message: message.into(),
            os_code: None,
            source: None,
        }
    }

    /// The raw OS error code carried by this error, if any.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            LumenError::Backend { os_code, .. } => *os_code,
            LumenError::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }
}
