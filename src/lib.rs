//! trialcam: multi-camera trial recorder
//!
//! Discovers the cameras attached to the machine, lets the operator preview
//! and name each one, then records named trials from every camera at once
//! into `<output_root>/<camera>/<trial>_<camera>.mp4` while showing a
//! combined live preview in the terminal.
//!
//! # Features
//! - Probing of camera indices across native and automatic capture backends
//! - Interactive naming with a short live preview per camera
//! - Atomic trial start: every camera records or none does
//! - H.264/MP4 output via openh264 and muxide (feature `recording`)
//! - Terminal preview with REC annotation and single-key controls
//!
//! # Usage
//! ```rust,ignore
//! use trialcam::{discovery, naming::NamingSession, registry::CameraRegistry};
//!
//! let config = trialcam::config::TrialCamConfig::load_or_default();
//! let backends = trialcam::platform::BackendChain::from_strategy(config.discovery.backend);
//! let ids = discovery::discover(&backends, &config.discovery, &config.open_params());
//! ```

pub mod app;
pub mod camera;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod invariant_ppt;
pub mod naming;
pub mod platform;
pub mod preview;
pub mod recording;
pub mod registry;
pub mod types;
pub mod ui;

// Testing utilities - scripted backend, in-memory sinks, synthetic frames
pub mod testing;

pub use app::{CaptureLoop, ExitReason, LoopReport};
pub use camera::CameraHandle;
pub use config::TrialCamConfig;
pub use errors::{CameraError, RecordingError};
pub use naming::{DuplicateNamePolicy, NamingSession};
pub use registry::CameraRegistry;
pub use recording::{RecordingSession, SessionState};
pub use types::{CameraId, CameraName, Frame};

use std::fs::OpenOptions;
use std::path::Path;

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "trialcam=info";

/// Initialize logging to stderr
pub fn init_logging() {
    let _ = logger_builder().try_init();
}

/// Initialize logging into `path` (appending), for use while the terminal
/// preview owns the screen.
pub fn init_file_logging(path: &Path) -> Result<(), CameraError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let _ = logger_builder()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init();
    Ok(())
}

fn logger_builder() -> env_logger::Builder {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_LOG_FILTER))
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        native_backend: platform::native_backend_name().to_string(),
        mp4_output: cfg!(feature = "recording"),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub native_backend: String,
    pub mp4_output: bool,
}
