// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Step-progress parsing for CLI output.
//!
//! stable-diffusion.cpp redraws its progress bar with carriage returns, so a
//! "line" ends at either `\r` or `\n`.

use std::sync::LazyLock;

use regex::Regex;

static STEP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)/(\d+)").expect("static regex is valid"));

/// Extract `(step, total)` from a progress line such as `|===>  | 3/20 - 1.2it/s`.
///
/// Returns `None` unless `0 < step <= total`.
pub fn parse_step(line: &str) -> Option<(u32, u32)> {
    let caps = STEP_RE.captures(line)?;
    let step: u32 = caps[1].parse().ok()?;
    let total: u32 = caps[2].parse().ok()?;
    (step > 0 && step <= total).then_some((step, total))
}

/// Accumulates raw output chunks and yields complete lines.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buf: String,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every line it completed. Empty lines are dropped.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        let mut lines = Vec::new();
        for ch in chunk.chars() {
            if ch == '\r' || ch == '\n' {
                if !self.buf.trim().is_empty() {
                    lines.push(std::mem::take(&mut self.buf));
                }
                self.buf.clear();
            } else {
                self.buf.push(ch);
            }
        }
        lines
    }

    /// The trailing partial line, if any.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        (!rest.trim().is_empty()).then_some(rest)
    }
}
