//! Named set of open cameras used for capture
//!
//! Built once after naming. Every tick the capture loop asks the registry
//! for one frame per camera; cameras that fail a read are simply absent from
//! that tick's result.

use std::collections::BTreeMap;

use crate::camera::CameraHandle;
use crate::platform::{CameraBackend, OpenParams};
use crate::types::{CameraId, CameraName, Frame};

/// Consecutive failed reads before a camera is reported as stalled.
pub const STALL_THRESHOLD: u32 = 30;

struct Entry {
    name: CameraName,
    handle: CameraHandle,
    misses: u32,
}

#[derive(Default)]
pub struct CameraRegistry {
    entries: BTreeMap<CameraId, Entry>,
}

impl CameraRegistry {
    /// Open every named camera. Cameras that fail to open are logged and left out.
    pub fn initialize(
        backend: &dyn CameraBackend,
        names: &BTreeMap<CameraId, CameraName>,
        params: &OpenParams,
    ) -> Self {
        let mut entries = BTreeMap::new();

        for (&id, name) in names {
            match CameraHandle::open(backend, id, params) {
                Ok(handle) => {
                    log::info!("Opened camera {} as '{}'", id, name);
                    entries.insert(
                        id,
                        Entry {
                            name: name.clone(),
                            handle,
                            misses: 0,
                        },
                    );
                }
                Err(e) => log::error!("Failed to open camera {} ('{}'): {}", id, name, e),
            }
        }

        log::info!("Camera registry ready with {} of {} camera(s)", entries.len(), names.len());
        Self { entries }
    }

    /// One read per camera, in ascending id order. Failed reads are omitted.
    pub fn read_all(&mut self) -> BTreeMap<CameraId, Frame> {
        let mut frames = BTreeMap::new();

        for (&id, entry) in self.entries.iter_mut() {
            match entry.handle.read() {
                Ok(frame) => {
                    if entry.misses >= STALL_THRESHOLD {
                        log::info!("Camera '{}' is delivering frames again", entry.name);
                    }
                    entry.misses = 0;
                    frames.insert(id, frame);
                }
                Err(e) => {
                    entry.misses = entry.misses.saturating_add(1);
                    if entry.misses == STALL_THRESHOLD {
                        log::warn!(
                            "Camera '{}' has failed {} reads in a row: {}",
                            entry.name,
                            STALL_THRESHOLD,
                            e
                        );
                    } else {
                        log::trace!("Camera '{}' read failed: {}", entry.name, e);
                    }
                }
            }
        }

        frames
    }

    /// Release every handle. Calling again does nothing.
    pub fn shutdown(&mut self) {
        let released = self
            .entries
            .values_mut()
            .filter(|entry| entry.handle.release())
            .count();
        if released > 0 {
            log::info!("Released {} camera(s)", released);
        }
    }

    pub fn names(&self) -> impl Iterator<Item = (CameraId, &CameraName)> + '_ {
        self.entries.iter().map(|(&id, entry)| (id, &entry.name))
    }

    pub fn name_of(&self, id: CameraId) -> Option<&CameraName> {
        self.entries.get(&id).map(|entry| &entry.name)
    }

    pub fn ids(&self) -> impl Iterator<Item = CameraId> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for CameraRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}
