// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Lumen integration tests.
//!
//! Provides mock adapters and a test harness for fast, deterministic,
//! CI-runnable tests without a real inference engine.
//!
//! # Components
//!
//! - [`MockBackend`] - Generation backend with scripted outcomes
//! - [`MockPostProcessor`] - Background remover that never touches disk
//! - [`EventRecorder`] - Broadcaster capturing every queue event
//! - [`TestHarness`] - Storage, processor and service wired together

pub mod harness;
pub mod mock_backend;
pub mod mock_post_processor;
pub mod recorder;

pub use harness::TestHarness;
pub use mock_backend::{Gate, MockBackend, MockOutcome, NO_SPACE_CODE};
pub use mock_post_processor::MockPostProcessor;
pub use recorder::EventRecorder;

use lumen_core::GenerationRequest;

/// A 512x512, 20 step request for model `m1`.
pub fn sample_request(prompt: &str, output_path: &str) -> GenerationRequest {
    GenerationRequest {
        prompt: prompt.to_string(),
        negative_prompt: None,
        model: "m1".into(),
        width: 512,
        height: 512,
        steps: 20,
        cfg_scale: 7.0,
        seed: None,
        output_path: output_path.to_string(),
        theme_id: None,
        template_id: None,
        template_values: None,
        remove_background: false,
    }
}
