//! End-to-end trial lifecycle: registry, recording session and capture loop
//!
//! Run with: cargo test --test session_lifecycle

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use trialcam::errors::RecordingError;
use trialcam::naming::{load_names, DuplicateNamePolicy};
use trialcam::platform::OpenParams;
use trialcam::recording::{RecordingConfig, RecordingSession, SessionState};
use trialcam::testing::{EventLog, MemorySinkFactory, ReadScript, ScriptedBackend, ScriptedUi};
use trialcam::ui::Command;
use trialcam::{CameraId, CameraName, CameraRegistry, CaptureLoop, ExitReason};

fn names(pairs: &[(CameraId, &str)]) -> BTreeMap<CameraId, CameraName> {
    pairs
        .iter()
        .map(|&(id, n)| (id, CameraName::new(n).unwrap()))
        .collect()
}

fn scripted_registry(
    log: &EventLog,
    cameras: &[(CameraId, &str, ReadScript)],
    width: u32,
    height: u32,
) -> CameraRegistry {
    let mut backend = ScriptedBackend::new(log.clone()).with_frame_size(width, height);
    for (id, _, script) in cameras {
        backend = backend.with_camera(*id, script.clone());
    }
    let pairs: Vec<(CameraId, &str)> = cameras.iter().map(|(id, n, _)| (*id, *n)).collect();
    CameraRegistry::initialize(&backend, &names(&pairs), &OpenParams::default())
}

fn memory_session(log: &EventLog, root: &Path) -> RecordingSession {
    RecordingSession::new(
        Box::new(MemorySinkFactory::new(log.clone())),
        root,
        RecordingConfig::new(32, 24, 30.0),
    )
}

#[test]
fn test_quit_mid_recording_finalizes_before_release() {
    let dir = tempfile::tempdir().unwrap();
    let log = EventLog::default();
    let registry = scripted_registry(
        &log,
        &[(0, "front", ReadScript::Always), (1, "side", ReadScript::Always)],
        32,
        24,
    );
    let ui = ScriptedUi::new(log.clone())
        .then(Some(Command::StartRecording))
        .answer("T1")
        .idle(4)
        .then(Some(Command::Quit));

    let mut capture = CaptureLoop::new(registry, memory_session(&log, dir.path()), ui)
        .with_tick_interval(Duration::ZERO);
    let report = capture.run().unwrap();

    assert_eq!(report.exit, ExitReason::Quit);
    assert_eq!(report.trials.len(), 1);
    assert_eq!(capture.session().state(), SessionState::Idle);

    let last_finish = log.last_position("finish:").unwrap();
    let first_release = log.position("release:").unwrap();
    let close = log.position("display-close").unwrap();
    assert!(last_finish < first_release, "sinks finalize before cameras are released");
    assert!(first_release < close, "cameras are released before the display closes");
    assert_eq!(log.count("release:"), 2);
    assert_eq!(log.count("display-close"), 1);

    // Start tick records nothing; the four idle ticks and the quit tick do
    let trial = &report.trials[0];
    assert_eq!(trial.camera("front").unwrap().frames_written, 5);
    assert_eq!(trial.camera("side").unwrap().frames_written, 5);
}

#[test]
fn test_camera_that_stops_reading_only_misses_ticks() {
    let dir = tempfile::tempdir().unwrap();
    let log = EventLog::default();
    let mut registry = scripted_registry(
        &log,
        &[(0, "front", ReadScript::Always), (1, "side", ReadScript::FailAfter(2))],
        32,
        24,
    );
    let mut session = memory_session(&log, dir.path());

    session.start("T1", &registry).unwrap();
    for _ in 0..6 {
        let frames = registry.read_all();
        session.write_if_active(&frames);
    }
    assert!(session.is_recording());
    let summary = session.stop().unwrap();

    assert_eq!(summary.camera("front").unwrap().frames_written, 6);
    let side = summary.camera("side").unwrap();
    assert_eq!(side.frames_written, 2);
    assert_eq!(side.missed_ticks(), 4);
    assert!(side.succeeded());
}

#[test]
fn test_shared_names_reject_start() {
    let dir = tempfile::tempdir().unwrap();
    let names_file = dir.path().join("names.toml");
    std::fs::write(&names_file, "[cameras]\n0 = \"top\"\n1 = \"top\"\n").unwrap();
    let named = load_names(&names_file, DuplicateNamePolicy::Allow).unwrap();

    let log = EventLog::default();
    let backend = ScriptedBackend::new(log.clone())
        .with_frame_size(32, 24)
        .with_camera(0, ReadScript::Always)
        .with_camera(1, ReadScript::Always);
    let registry = CameraRegistry::initialize(&backend, &named, &OpenParams::default());
    let mut session = memory_session(&log, dir.path());

    let result = session.start("T1", &registry);
    assert!(matches!(result, Err(RecordingError::PathCollision { .. })));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.active_cameras().is_empty());
    assert!(!dir.path().join("top").join("T1_top.mem").exists());
}

#[test]
fn test_repeated_trial_name_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let log = EventLog::default();
    let registry = scripted_registry(&log, &[(0, "front", ReadScript::Always)], 32, 24);
    let mut session = memory_session(&log, dir.path());

    session.start("T1", &registry).unwrap();
    session.stop().unwrap();
    let before = std::fs::read(dir.path().join("front").join("T1_front.mem")).unwrap();

    assert!(matches!(session.start("T1", &registry), Err(RecordingError::TrialExists { .. })));
    let after = std::fs::read(dir.path().join("front").join("T1_front.mem")).unwrap();
    assert_eq!(before, after);

    session.start("T2", &registry).unwrap();
    assert_eq!(session.trial_name(), Some("T2"));
}

#[cfg(feature = "recording")]
mod mp4_output {
    use super::*;
    use trialcam::recording::Mp4SinkFactory;

    #[test]
    fn test_trial_writes_one_mp4_per_camera() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let mut registry = scripted_registry(
            &log,
            &[(0, "front", ReadScript::Always), (1, "side", ReadScript::Always)],
            160,
            120,
        );
        let mut session = RecordingSession::new(
            Box::new(Mp4SinkFactory),
            dir.path(),
            RecordingConfig::new(160, 120, 30.0),
        );

        session.start("T1", &registry).unwrap();
        for _ in 0..10 {
            let frames = registry.read_all();
            session.write_if_active(&frames);
        }
        let summary = session.stop().unwrap();

        for camera in ["front", "side"] {
            let path = dir.path().join(camera).join(format!("T1_{}.mp4", camera));
            let len = std::fs::metadata(&path).unwrap().len();
            assert!(len > 0, "{} should have content", path.display());

            let stats = summary.camera(camera).unwrap().stats.as_ref().unwrap();
            assert_eq!(stats.output_path, path);
            assert!(stats.bytes_written > 0);
        }
        assert_eq!(summary.total_frames(), 20);
        registry.shutdown();
    }

    #[test]
    fn test_mismatched_frames_are_resized() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let mut registry =
            scripted_registry(&log, &[(0, "front", ReadScript::Always)], 320, 240);
        let mut session = RecordingSession::new(
            Box::new(Mp4SinkFactory),
            dir.path(),
            RecordingConfig::new(160, 120, 30.0),
        );

        session.start("T1", &registry).unwrap();
        for _ in 0..3 {
            let frames = registry.read_all();
            session.write_if_active(&frames);
        }
        let summary = session.stop().unwrap();

        let stats = summary.camera("front").unwrap().stats.as_ref().unwrap();
        assert_eq!(stats.resized_frames, 3);
    }
}
