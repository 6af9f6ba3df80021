//! Device discovery
//!
//! Probes a bounded index range and reports which indices produce frames.
//! Every probe handle is released before moving on, so discovery never
//! leaves a device open.

use std::collections::BTreeSet;
use std::thread;
use std::time::Duration;

use crate::camera::CameraHandle;
use crate::config::DiscoveryConfig;
use crate::platform::{BackendChain, CameraBackend, OpenParams};
use crate::types::CameraId;

/// Probe indices `0..config.max_index` and return those that yielded a frame.
///
/// Each backend in the chain gets a turn per index until one of them produces
/// a frame. Failures are logged and otherwise ignored; an empty set means no
/// usable cameras.
pub fn discover(
    backends: &BackendChain,
    config: &DiscoveryConfig,
    params: &OpenParams,
) -> BTreeSet<CameraId> {
    log::info!(
        "Probing camera indices 0..{} ({} attempts per device)",
        config.max_index,
        config.probe_attempts
    );

    let mut found = BTreeSet::new();
    for id in 0..config.max_index {
        for backend in backends.backends() {
            if probe(backend, id, config, params) {
                log::info!("Camera {} is working ({})", id, backend.name());
                found.insert(id);
                break;
            }
        }
    }

    log::info!("Discovered {} camera(s): {:?}", found.len(), found);
    found
}

/// Open, warm up, read until a frame arrives or attempts run out, release.
fn probe(backend: &dyn CameraBackend, id: CameraId, config: &DiscoveryConfig, params: &OpenParams) -> bool {
    let mut handle = match CameraHandle::open(backend, id, params) {
        Ok(handle) => handle,
        Err(e) => {
            log::debug!("Index {} not available on {}: {}", id, backend.name(), e);
            return false;
        }
    };

    log::debug!("Trying camera index {} with {}...", id, backend.name());
    pause(config.warmup());

    let attempts = config.probe_attempts.max(1);
    let mut found = false;
    for attempt in 1..=attempts {
        match handle.read() {
            Ok(frame) => {
                log::debug!(
                    "Camera {} produced a {}x{} frame on attempt {}",
                    id,
                    frame.width(),
                    frame.height(),
                    attempt
                );
                found = true;
                break;
            }
            Err(e) => {
                log::debug!("Camera {} read attempt {}/{} failed: {}", id, attempt, attempts, e);
                if attempt < attempts {
                    pause(config.retry_delay());
                }
            }
        }
    }

    handle.release();
    if !found {
        log::warn!("Camera {} opened but never produced a frame", id);
    }
    found
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}
