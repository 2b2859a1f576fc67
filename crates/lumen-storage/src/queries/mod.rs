// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the queue and history tables.

pub mod generations;
pub mod queue;

use lumen_core::JobStatus;

/// Render statuses as a SQL `IN` list body, e.g. `'failed', 'complete'`.
///
/// Values come from the closed [`JobStatus`] set, never from user input.
pub(crate) fn status_list(statuses: &[JobStatus]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Wrap a decode error so it can be returned from a row-mapping closure.
pub(crate) fn conversion_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}
