// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generation backends and post-processors for Lumen.
//!
//! [`SdCliBackend`] runs a stable-diffusion.cpp style binary once per job and
//! turns its progress bar into step reports. [`RembgPostProcessor`] produces
//! transparent copies of finished images.

pub mod process;
pub mod progress;
pub mod rembg;
pub mod sd_cli;

pub use rembg::RembgPostProcessor;
pub use sd_cli::SdCliBackend;
