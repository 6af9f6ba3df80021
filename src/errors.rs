use std::fmt;
use std::path::PathBuf;

use crate::types::{CameraId, CameraName};

#[derive(Debug)]
pub enum CameraError {
    DeviceUnavailable(String),
    ReadError(String),
    DeviceClosed(CameraId),
    SinkOpenError(String),
    SinkWriteError(String),
    InvalidInput(String),
    ConfigError(String),
    IoError(String),
    DisplayError(String),
    #[cfg(feature = "recording")]
    EncodingError(String),
    #[cfg(feature = "recording")]
    MuxingError(String),
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CameraError::DeviceUnavailable(msg) => write!(f, "Device unavailable: {}", msg),
            CameraError::ReadError(msg) => write!(f, "Read error: {}", msg),
            CameraError::DeviceClosed(id) => write!(f, "Camera {} is closed", id),
            CameraError::SinkOpenError(msg) => write!(f, "Sink open error: {}", msg),
            CameraError::SinkWriteError(msg) => write!(f, "Sink write error: {}", msg),
            CameraError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            CameraError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            CameraError::IoError(msg) => write!(f, "IO error: {}", msg),
            CameraError::DisplayError(msg) => write!(f, "Display error: {}", msg),
            #[cfg(feature = "recording")]
            CameraError::EncodingError(msg) => write!(f, "Encoding error: {}", msg),
            #[cfg(feature = "recording")]
            CameraError::MuxingError(msg) => write!(f, "Muxing error: {}", msg),
        }
    }
}

impl std::error::Error for CameraError {}

impl From<std::io::Error> for CameraError {
    fn from(error: std::io::Error) -> Self {
        CameraError::IoError(error.to_string())
    }
}

/// Outcome of a rejected start/stop request on a recording session.
///
/// None of these leave sinks open behind them; the session is always in a
/// well-defined state afterwards.
#[derive(Debug)]
pub enum RecordingError {
    AlreadyRecording { trial: String },
    NotRecording,
    EmptyTrialName,
    InvalidTrialName(String),
    NoCameras,
    TrialExists { path: PathBuf },
    PathCollision { path: PathBuf },
    SinkOpen { camera: CameraName, source: CameraError },
}

impl fmt::Display for RecordingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordingError::AlreadyRecording { trial } => {
                write!(f, "already recording trial '{}'", trial)
            }
            RecordingError::NotRecording => write!(f, "not recording"),
            RecordingError::EmptyTrialName => write!(f, "trial name is empty"),
            RecordingError::InvalidTrialName(msg) => write!(f, "invalid trial name: {}", msg),
            RecordingError::NoCameras => write!(f, "no cameras to record"),
            RecordingError::TrialExists { path } => {
                write!(f, "trial output already exists: {}", path.display())
            }
            RecordingError::PathCollision { path } => write!(
                f,
                "two cameras would record to the same file: {}",
                path.display()
            ),
            RecordingError::SinkOpen { camera, source } => {
                write!(f, "could not open output for '{}': {}", camera, source)
            }
        }
    }
}

impl std::error::Error for RecordingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecordingError::SinkOpen { source, .. } => Some(source),
            _ => None,
        }
    }
}
