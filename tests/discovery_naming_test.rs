//! Discovery and naming against the scripted backend
//!
//! Run with: cargo test --test discovery_naming_test

use std::collections::BTreeSet;
use std::time::Duration;

use trialcam::config::DiscoveryConfig;
use trialcam::naming::{ensure_output_dirs, DuplicateNamePolicy, NamingSession};
use trialcam::platform::{BackendChain, CameraBackend, OpenParams};
use trialcam::testing::{EventLog, ReadScript, ScriptedBackend, ScriptedUi};
use trialcam::CameraError;

fn fast_discovery(max_index: u32) -> DiscoveryConfig {
    DiscoveryConfig {
        max_index,
        probe_attempts: 3,
        warmup_ms: 0,
        retry_delay_ms: 0,
        ..DiscoveryConfig::default()
    }
}

fn small() -> OpenParams {
    OpenParams {
        width: 16,
        height: 12,
        fps: 30,
    }
}

#[test]
fn test_discovery_finds_only_working_index() {
    let log = EventLog::default();
    let backend = ScriptedBackend::new(log.clone())
        .with_camera(0, ReadScript::Never)
        .with_camera(1, ReadScript::Always);
    let chain = BackendChain::new(vec![Box::new(backend)]);

    let found = trialcam::discovery::discover(&chain, &fast_discovery(3), &small());

    assert_eq!(found, BTreeSet::from([1]));
    // Every probe handle is released, including the one that never produced a frame
    assert_eq!(log.count("release:0"), 1);
    assert_eq!(log.count("release:1"), 1);
}

#[test]
fn test_discovery_counts_index_once_across_backends() {
    let log = EventLog::default();
    let native = ScriptedBackend::new(log.clone())
        .named("native")
        .with_camera(1, ReadScript::Always);
    let auto = ScriptedBackend::new(log.clone())
        .named("auto")
        .with_camera(1, ReadScript::Always)
        .with_camera(2, ReadScript::Always);
    let chain = BackendChain::new(vec![Box::new(native), Box::new(auto)]);

    let found = trialcam::discovery::discover(&chain, &fast_discovery(4), &small());

    assert_eq!(found, BTreeSet::from([1, 2]));
    // Index 1 was found by the first backend, so the second never opened it
    assert_eq!(log.count("device-open:1"), 1);
}

#[test]
fn test_discovery_retries_slow_starters() {
    let log = EventLog::default();
    let backend = ScriptedBackend::new(log.clone())
        .with_camera(0, ReadScript::Pattern(vec![false, false, true]));
    let chain = BackendChain::new(vec![Box::new(backend)]);

    let found = trialcam::discovery::discover(&chain, &fast_discovery(1), &small());
    assert_eq!(found, BTreeSet::from([0]));

    let impatient = DiscoveryConfig {
        probe_attempts: 2,
        ..fast_discovery(1)
    };
    assert!(trialcam::discovery::discover(&chain, &impatient, &small()).is_empty());
}

#[test]
fn test_chain_falls_back_to_second_backend() {
    let log = EventLog::default();
    let native = ScriptedBackend::new(log.clone()).named("native");
    let auto = ScriptedBackend::new(log.clone())
        .named("auto")
        .with_camera(0, ReadScript::Always);
    let chain = BackendChain::new(vec![Box::new(native), Box::new(auto)]);

    assert!(chain.open(0, &small()).is_ok());
    match chain.open(5, &small()) {
        Err(CameraError::DeviceUnavailable(msg)) => {
            assert!(msg.contains("native"));
            assert!(msg.contains("auto"));
        }
        other => panic!("expected DeviceUnavailable, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_naming_reprompts_and_skips_dead_cameras() {
    let log = EventLog::default();
    let backend = ScriptedBackend::new(log.clone())
        .with_camera(0, ReadScript::Always)
        .with_camera(1, ReadScript::Never)
        .with_camera(3, ReadScript::Always);
    let mut ui = ScriptedUi::new(log.clone())
        .answer("")
        .answer("front")
        .answer(" front ")
        .answer("side");

    let names = NamingSession::new(&backend, small())
        .with_preview_duration(Duration::ZERO)
        .assign_names(&BTreeSet::from([0, 1, 2, 3]), &mut ui)
        .unwrap();

    let named: Vec<(u32, &str)> = names.iter().map(|(id, n)| (*id, n.as_str())).collect();
    assert_eq!(named, vec![(0, "front"), (3, "side")]);
    assert_eq!(ui.questions.len(), 4);
    assert!(ui.surfaces_shown >= 2);

    // Each previewed device is released exactly once; index 2 never opened
    assert_eq!(log.count("release:0"), 1);
    assert_eq!(log.count("release:1"), 1);
    assert_eq!(log.count("release:3"), 1);
    assert_eq!(log.count("device-open:2"), 0);
}

#[test]
fn test_naming_suffix_policy() {
    let log = EventLog::default();
    let backend = ScriptedBackend::new(log.clone())
        .with_camera(0, ReadScript::Always)
        .with_camera(1, ReadScript::Always);
    let mut ui = ScriptedUi::new(log.clone()).answer("top").answer("top");

    let names = NamingSession::new(&backend, small())
        .with_preview_duration(Duration::ZERO)
        .with_policy(DuplicateNamePolicy::Suffix)
        .assign_names(&BTreeSet::from([0, 1]), &mut ui)
        .unwrap();

    assert_eq!(names[&0].as_str(), "top");
    assert_eq!(names[&1].as_str(), "top_2");
}

#[test]
fn test_naming_fails_when_input_closes() {
    let log = EventLog::default();
    let backend = ScriptedBackend::new(log.clone()).with_camera(0, ReadScript::Always);
    let mut ui = ScriptedUi::new(log.clone());

    let result = NamingSession::new(&backend, small())
        .with_preview_duration(Duration::ZERO)
        .assign_names(&BTreeSet::from([0]), &mut ui);

    assert!(matches!(result, Err(CameraError::InvalidInput(_))));
    assert_eq!(log.count("release:0"), 1);
}

#[test]
fn test_output_dirs_for_named_cameras() {
    let dir = tempfile::tempdir().unwrap();
    let log = EventLog::default();
    let backend = ScriptedBackend::new(log.clone()).with_camera(0, ReadScript::Always);
    let mut ui = ScriptedUi::new(log.clone()).answer("front");

    let names = NamingSession::new(&backend, small())
        .with_preview_duration(Duration::ZERO)
        .assign_names(&BTreeSet::from([0]), &mut ui)
        .unwrap();
    ensure_output_dirs(dir.path(), names.values()).unwrap();
    ensure_output_dirs(dir.path(), names.values()).unwrap();

    assert!(dir.path().join("front").is_dir());
}
