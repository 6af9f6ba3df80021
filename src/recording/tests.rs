//! Tests for the recording session

#[cfg(test)]
mod recording_tests {
    use std::collections::BTreeMap;

    use crate::errors::RecordingError;
    use crate::invariant_ppt::contract_test;
    use crate::platform::OpenParams;
    use crate::recording::{RecordingConfig, RecordingSession, SessionState};
    use crate::registry::CameraRegistry;
    use crate::testing::{
        synthetic_frame, EventLog, MemorySinkFactory, ReadScript, ScriptedBackend,
    };
    use crate::types::{CameraId, CameraName, Frame};

    fn registry(log: &EventLog, names: &[(CameraId, &str)]) -> CameraRegistry {
        let mut backend = ScriptedBackend::new(log.clone());
        for &(id, _) in names {
            backend = backend.with_camera(id, ReadScript::Always);
        }
        let names: BTreeMap<CameraId, CameraName> = names
            .iter()
            .map(|&(id, n)| (id, CameraName::new(n).unwrap()))
            .collect();
        CameraRegistry::initialize(&backend, &names, &OpenParams::default())
    }

    fn session(factory: MemorySinkFactory, root: &std::path::Path) -> RecordingSession {
        RecordingSession::new(Box::new(factory), root, RecordingConfig::new(64, 48, 30.0))
    }

    fn frames(ids: &[CameraId]) -> BTreeMap<CameraId, Frame> {
        ids.iter().map(|&id| (id, synthetic_frame(id as u64, 64, 48))).collect()
    }

    #[test]
    fn test_start_while_recording_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let registry = registry(&log, &[(0, "front")]);
        let mut session = session(MemorySinkFactory::new(log.clone()), dir.path());

        session.start("T1", &registry).unwrap();
        let again = session.start("T2", &registry);

        assert!(matches!(again, Err(RecordingError::AlreadyRecording { ref trial }) if trial == "T1"));
        assert_eq!(session.trial_name(), Some("T1"));
        assert_eq!(log.count("open:"), 1);
    }

    #[test]
    fn test_stop_while_idle_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(MemorySinkFactory::new(EventLog::default()), dir.path());
        assert!(matches!(session.stop(), Err(RecordingError::NotRecording)));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_blank_trial_name_opens_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let registry = registry(&log, &[(0, "front"), (1, "side")]);
        let mut session = session(MemorySinkFactory::new(log.clone()), dir.path());

        assert!(matches!(session.start("   ", &registry), Err(RecordingError::EmptyTrialName)));
        assert!(matches!(
            session.start("a/b", &registry),
            Err(RecordingError::InvalidTrialName(_))
        ));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(log.count("open:"), 0);
    }

    #[test]
    fn test_trial_name_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let registry = registry(&log, &[(0, "front")]);
        let mut session = session(MemorySinkFactory::new(log.clone()), dir.path());

        session.start("  T1 ", &registry).unwrap();
        assert_eq!(session.trial_name(), Some("T1"));
        let summary = session.stop().unwrap();
        assert!(summary.cameras[0].path.ends_with("front/T1_front.mem"));
    }

    #[test]
    fn test_failed_open_leaves_no_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let registry = registry(&log, &[(0, "front"), (1, "side"), (2, "top")]);
        let factory = MemorySinkFactory::new(log.clone()).fail_open_for("side");
        let mut session = session(factory, dir.path());

        let result = session.start("T1", &registry);
        assert!(matches!(result, Err(RecordingError::SinkOpen { ref camera, .. }) if camera.as_str() == "side"));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.active_cameras().is_empty());
        // "front" was opened before "side" failed and has been discarded again
        assert_eq!(log.count("open:front"), 1);
        assert_eq!(log.count("discard:front"), 1);
        assert_eq!(log.count("open:top"), 0);
    }

    #[test]
    fn test_existing_trial_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let registry = registry(&log, &[(0, "front")]);
        let mut session = session(MemorySinkFactory::new(log.clone()), dir.path());

        std::fs::create_dir_all(dir.path().join("front")).unwrap();
        std::fs::write(dir.path().join("front").join("T1_front.mem"), b"old").unwrap();

        assert!(matches!(session.start("T1", &registry), Err(RecordingError::TrialExists { .. })));
        assert_eq!(log.count("open:"), 0);
    }

    #[test]
    fn test_shared_names_collide() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let registry = registry(&log, &[(0, "top"), (1, "top")]);
        let mut session = session(MemorySinkFactory::new(log.clone()), dir.path());

        assert!(matches!(session.start("T1", &registry), Err(RecordingError::PathCollision { .. })));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(log.count("open:"), 0);
    }

    #[test]
    fn test_empty_registry_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(MemorySinkFactory::new(EventLog::default()), dir.path());
        let empty = CameraRegistry::default();
        assert!(matches!(session.start("T1", &empty), Err(RecordingError::NoCameras)));
    }

    #[test]
    fn test_missing_frames_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let registry = registry(&log, &[(0, "front"), (1, "side")]);
        let mut session = session(MemorySinkFactory::new(log.clone()), dir.path());

        assert_eq!(session.write_if_active(&frames(&[0, 1])), 0);

        session.start("T1", &registry).unwrap();
        assert_eq!(session.write_if_active(&frames(&[0, 1])), 2);
        assert_eq!(session.write_if_active(&frames(&[0])), 1);
        assert_eq!(session.frames_written(0), Some(2));
        assert_eq!(session.frames_written(1), Some(1));

        let summary = session.stop().unwrap();
        let side = summary.camera("side").unwrap();
        assert_eq!(side.ticks, 2);
        assert_eq!(side.missed_ticks(), 1);
    }

    #[test]
    fn test_write_failure_drops_only_that_camera() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let registry = registry(&log, &[(0, "front"), (1, "side")]);
        let factory = MemorySinkFactory::new(log.clone()).fail_write_after("side", 1);
        let mut session = session(factory, dir.path());

        session.start("T1", &registry).unwrap();
        session.write_if_active(&frames(&[0, 1]));
        session.write_if_active(&frames(&[0, 1]));

        assert!(session.is_recording());
        assert_eq!(session.active_cameras(), vec![0]);
        assert_eq!(log.count("finish:side"), 1);

        let summary = session.stop().unwrap();
        assert!(summary.camera("side").unwrap().error.is_some());
        assert!(summary.camera("front").unwrap().succeeded());
        assert_eq!(log.count("finish:side"), 1);
    }

    #[test]
    fn test_losing_every_sink_ends_the_trial() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let registry = registry(&log, &[(0, "front")]);
        let factory = MemorySinkFactory::new(log.clone()).fail_write_after("front", 0);
        let mut session = session(factory, dir.path());

        session.start("T1", &registry).unwrap();
        assert_eq!(session.write_if_active(&frames(&[0])), 0);

        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.active_cameras().is_empty());
        assert_eq!(session.last_summary().unwrap().trial, "T1");
        assert!(matches!(session.stop(), Err(RecordingError::NotRecording)));
    }

    #[test]
    fn test_stop_finalizes_every_sink_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let registry = registry(&log, &[(0, "front"), (1, "side")]);
        let mut session = session(MemorySinkFactory::new(log.clone()), dir.path());

        session.start("T1", &registry).unwrap();
        for _ in 0..5 {
            session.write_if_active(&frames(&[0, 1]));
        }
        let summary = session.stop().unwrap();

        assert_eq!(summary.total_frames(), 10);
        assert_eq!(log.count("finish:front"), 1);
        assert_eq!(log.count("finish:side"), 1);
        assert!(dir.path().join("front").join("T1_front.mem").exists());
        assert!(dir.path().join("side").join("T1_side.mem").exists());

        // The next trial gets fresh sinks
        session.start("T2", &registry).unwrap();
        assert_eq!(session.frames_written(0), Some(0));
    }

    #[test]
    fn contract_session_invariants() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let registry = registry(&log, &[(0, "front")]);
        let mut session = session(MemorySinkFactory::new(log.clone()), dir.path());

        session.start("T1", &registry).unwrap();
        session.write_if_active(&frames(&[0]));
        session.stop().unwrap();

        contract_test(
            "recording session",
            &["Recording session has sinks exactly while recording"],
        );
    }
}
