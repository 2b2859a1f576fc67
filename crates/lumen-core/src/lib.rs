// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Lumen image generation queue.
//!
//! This crate provides the trait definitions, error type and domain types
//! shared by the storage, backend, queue and binary crates.

pub mod error;
pub mod traits;
pub mod types;

pub use error::LumenError;
pub use types::{
    AdapterType, GenerationOutcome, GenerationProgress, GenerationRecord, GenerationRequest,
    HealthStatus, HistoryFilter, JobStatus, QueueCounts, QueueEvent, QueueItem, QueueSnapshot,
    StatusUpdate, now_timestamp,
};

pub use traits::{
    GenerationBackend, HistoryStore, JobStore, PluginAdapter, PostProcessor, ProgressFn,
    QueueBroadcaster, StorageAdapter,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::{Arc, Mutex};

    fn fox_request() -> GenerationRequest {
        GenerationRequest {
            prompt: "a fox".into(),
            negative_prompt: None,
            model: "m1".into(),
            width: 512,
            height: 512,
            steps: 20,
            cfg_scale: 7.0,
            seed: None,
            output_path: "/out/g1.png".into(),
            theme_id: None,
            template_id: None,
            template_values: None,
            remove_background: false,
        }
    }

    #[test]
    fn lumen_error_has_all_variants() {
        let _config = LumenError::Config("test".into());
        let _storage = LumenError::storage(std::io::Error::other("test"));
        let _backend = LumenError::backend("test");
        let _io = LumenError::Io(std::io::Error::other("test"));
        let _post = LumenError::PostProcess {
            message: "test".into(),
            source: None,
        };
        let _not_found = LumenError::NotFound {
            kind: "job".into(),
            id: "g1".into(),
        };
        let exists = LumenError::AlreadyExists {
            kind: "generation".into(),
            id: "g1".into(),
        };
        assert_eq!(exists.to_string(), "generation already exists: g1");
        let _internal = LumenError::Internal("test".into());
    }

    #[test]
    fn os_code_is_read_from_backend_and_io_errors() {
        let backend = LumenError::Backend {
            message: "write failed".into(),
            os_code: Some(28),
            source: None,
        };
        assert_eq!(backend.os_code(), Some(28));

        let io = LumenError::Io(std::io::Error::from_raw_os_error(28));
        assert_eq!(io.os_code(), Some(28));

        assert_eq!(LumenError::backend("crashed").os_code(), None);
        assert_eq!(LumenError::Internal("x".into()).os_code(), None);
    }

    #[test]
    fn job_status_display_and_parse() {
        for status in JobStatus::ALL {
            let s = status.to_string();
            assert_eq!(s, status.as_str());
            assert_eq!(JobStatus::from_str(&s).unwrap(), status);
        }
        assert_eq!(JobStatus::Generating.to_string(), "generating");
        assert!(JobStatus::from_str("running").is_err());
    }

    #[test]
    fn job_status_transitions() {
        use JobStatus::*;

        assert!(Pending.can_transition_to(Generating));
        assert!(Generating.can_transition_to(Complete));
        assert!(Generating.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Pending));

        assert!(!Pending.can_transition_to(Complete));
        assert!(!Pending.can_transition_to(Failed));
        assert!(!Complete.can_transition_to(Pending));
        assert!(!Complete.can_transition_to(Generating));
        assert!(!Failed.can_transition_to(Generating));

        assert!(Complete.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!Pending.is_terminal());
        assert!(!Generating.is_terminal());
    }

    #[test]
    fn request_json_round_trip_and_defaults() {
        let mut request = fox_request();
        request.template_values = Some(
            [("animal".to_string(), "fox".to_string())]
                .into_iter()
                .collect(),
        );
        let json = serde_json::to_string(&request).unwrap();
        let parsed: GenerationRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, request);

        // Optional fields may be omitted entirely.
        let minimal = r#"{"prompt":"a fox","model":"m1","width":512,"height":512,
            "steps":20,"cfg_scale":7.0,"output_path":"/out/g1.png"}"#;
        let parsed: GenerationRequest = serde_json::from_str(minimal).unwrap();
        assert_eq!(parsed, fox_request());
    }

    #[test]
    fn queue_event_serializes_with_kebab_tag() {
        let event = QueueEvent::StatusChange {
            job_id: "g1".into(),
            status: JobStatus::Generating,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "status-change");
        assert_eq!(json["job_id"], "g1");
        assert_eq!(json["status"], "generating");

        let disk_full = serde_json::to_value(QueueEvent::DiskFull {
            job_id: "g2".into(),
        })
        .unwrap();
        assert_eq!(disk_full["event"], "disk-full");

        let snapshot = QueueEvent::QueueStatus(QueueSnapshot {
            pending: 2,
            generating: Some("g1".into()),
            completed: 1,
            failed: 0,
        });
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["event"], "queue-status");
        assert_eq!(json["pending"], 2);
        assert_eq!(json["generating"], "g1");
        assert_eq!(snapshot.job_id(), None);
    }

    #[test]
    fn snapshot_from_counts() {
        let counts = QueueCounts {
            pending: 3,
            generating: 1,
            completed: 4,
            failed: 2,
            generating_id: Some("g7".into()),
        };
        let snapshot = QueueSnapshot::from(counts);
        assert_eq!(snapshot.pending, 3);
        assert_eq!(snapshot.generating.as_deref(), Some("g7"));
        assert_eq!(snapshot.completed, 4);
        assert_eq!(snapshot.failed, 2);
    }

    #[test]
    fn progress_percent() {
        assert_eq!(GenerationProgress::new(10, 20).percent, 50.0);
        assert_eq!(GenerationProgress::new(20, 20).percent, 100.0);
        assert_eq!(GenerationProgress::new(3, 0).percent, 0.0);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let on_progress: ProgressFn = Arc::new(move |p| sink.lock().unwrap().push(p.step));
        on_progress(GenerationProgress::new(1, 2));
        on_progress(GenerationProgress::new(2, 2));
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn record_copies_request_fields() {
        let mut request = fox_request();
        request.theme_id = Some("forest".into());
        let record = GenerationRecord::from_request("g1", &request, 42, "/out/g1.png".into(), 1200);
        assert_eq!(record.id, "g1");
        assert_eq!(record.prompt, "a fox");
        assert_eq!(record.seed, 42);
        assert_eq!(record.generation_time_ms, 1200);
        assert_eq!(record.theme_id.as_deref(), Some("forest"));
        assert!(record.transparent_path.is_none());
        assert!(record.created_at.ends_with('Z'));
    }

    #[test]
    fn timestamps_sort_chronologically() {
        let a = now_timestamp();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = now_timestamp();
        assert_eq!(a.len(), "2026-01-01T00:00:00.000Z".len());
        assert!(a < b);
    }

    #[test]
    fn all_traits_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_storage_adapter<T: StorageAdapter>() {}
        fn _assert_job_store<T: JobStore>() {}
        fn _assert_history_store<T: HistoryStore>() {}
        fn _assert_backend<T: GenerationBackend>() {}
        fn _assert_post_processor<T: PostProcessor>() {}
        fn _assert_broadcaster<T: QueueBroadcaster>() {}
    }
}
