//! Camera device capability traits and backend selection
//!
//! Discovery, naming and the registry only ever talk to a [`CameraBackend`]
//! and the [`CameraDevice`] it opens. The nokhwa implementation lives in
//! [`nokhwa_backend`]; tests use the scripted backend from
//! [`crate::testing`].

pub mod nokhwa_backend;

use serde::{Deserialize, Serialize};

use crate::errors::CameraError;
use crate::types::{CameraId, Frame};

pub use nokhwa_backend::NokhwaBackend;

/// Requested capture geometry when opening a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenParams {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for OpenParams {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

/// One opened camera device.
pub trait CameraDevice {
    fn id(&self) -> CameraId;

    /// Grab the next frame. Must return promptly, never block indefinitely.
    fn read(&mut self) -> Result<Frame, CameraError>;

    /// Stop streaming and give the device back to the OS. Called at most once.
    fn release(&mut self);
}

/// Something that can open camera devices by enumeration index.
pub trait CameraBackend {
    fn name(&self) -> &str;

    fn open(&self, id: CameraId, params: &OpenParams) -> Result<Box<dyn CameraDevice>, CameraError>;
}

/// Which capture APIs to try, in order, for each device index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendStrategy {
    /// Only the platform's native API (MediaFoundation, AVFoundation, V4L2).
    Native,
    /// Only the capture library's automatic backend choice.
    Auto,
    /// Native first, automatic as a fallback.
    #[default]
    NativeThenAuto,
}

/// Ordered list of backends; `open` returns the first device that opens.
pub struct BackendChain {
    backends: Vec<Box<dyn CameraBackend>>,
}

impl BackendChain {
    pub fn new(backends: Vec<Box<dyn CameraBackend>>) -> Self {
        Self { backends }
    }

    pub fn from_strategy(strategy: BackendStrategy) -> Self {
        let backends: Vec<Box<dyn CameraBackend>> = match strategy {
            BackendStrategy::Native => vec![Box::new(NokhwaBackend::native())],
            BackendStrategy::Auto => vec![Box::new(NokhwaBackend::auto())],
            BackendStrategy::NativeThenAuto => vec![
                Box::new(NokhwaBackend::native()),
                Box::new(NokhwaBackend::auto()),
            ],
        };
        Self::new(backends)
    }

    pub fn backends(&self) -> impl Iterator<Item = &dyn CameraBackend> {
        self.backends.iter().map(|b| b.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl CameraBackend for BackendChain {
    fn name(&self) -> &str {
        "chain"
    }

    fn open(&self, id: CameraId, params: &OpenParams) -> Result<Box<dyn CameraDevice>, CameraError> {
        let mut failures = Vec::new();
        for backend in &self.backends {
            match backend.open(id, params) {
                Ok(device) => {
                    log::debug!("Camera {} opened with {} backend", id, backend.name());
                    return Ok(device);
                }
                Err(e) => {
                    log::debug!("Camera {} failed on {} backend: {}", id, backend.name(), e);
                    failures.push(format!("{}: {}", backend.name(), e));
                }
            }
        }
        Err(CameraError::DeviceUnavailable(format!(
            "camera {} could not be opened ({})",
            id,
            if failures.is_empty() {
                "no backends configured".to_string()
            } else {
                failures.join("; ")
            }
        )))
    }
}

/// Name of the platform's native capture API, for diagnostics.
pub fn native_backend_name() -> &'static str {
    nokhwa_backend::native_api_name()
}
