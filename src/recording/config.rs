//! Recording configuration and per-trial statistics

use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::types::CameraId;

/// Settings every sink of a trial is opened with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Video width in pixels
    pub width: u32,
    /// Video height in pixels
    pub height: u32,
    /// Frames per second written into the container
    pub fps: f64,
    /// Target bitrate in bits per second
    pub bitrate: u32,
    /// Enable fast-start (moov before mdat)
    pub fast_start: bool,
    /// Optional title metadata
    pub title: Option<String>,
}

impl RecordingConfig {
    /// Create a new recording configuration with explicit dimensions
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            width,
            height,
            fps,
            bitrate: 2_500_000,
            fast_start: true,
            title: None,
        }
    }

    /// Set the title metadata
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set fast-start mode
    pub fn with_fast_start(mut self, enabled: bool) -> Self {
        self.fast_start = enabled;
        self
    }

    /// Set custom bitrate
    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }

    pub fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self::new(640, 480, 30.0)
    }
}

/// Statistics returned by a sink once it is finalized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingStats {
    /// Frames that made it into the file
    pub video_frames: u64,
    /// Frames the encoder produced no output for
    pub dropped_frames: u64,
    /// Frames resized to the sink's frame size before encoding
    pub resized_frames: u64,
    /// Media duration in seconds
    pub duration_secs: f64,
    /// Total bytes written to file
    pub bytes_written: u64,
    /// Output file path
    pub output_path: PathBuf,
}

impl RecordingStats {
    /// Calculate the average bitrate achieved
    pub fn avg_bitrate(&self) -> f64 {
        if self.duration_secs > 0.0 {
            (self.bytes_written as f64 * 8.0) / self.duration_secs
        } else {
            0.0
        }
    }
}

/// How one camera fared during a trial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSummary {
    pub id: CameraId,
    pub camera: String,
    pub path: PathBuf,
    /// Loop ticks this camera's sink was active for
    pub ticks: u64,
    /// Frames appended to the sink
    pub frames_written: u64,
    /// Present when the sink finalized cleanly
    pub stats: Option<RecordingStats>,
    /// Write or finalize failure that ended this camera's recording
    pub error: Option<String>,
}

impl CameraSummary {
    /// Ticks where the camera had no frame to contribute
    pub fn missed_ticks(&self) -> u64 {
        self.ticks.saturating_sub(self.frames_written)
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a completed trial, one entry per camera in id order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialSummary {
    pub trial: String,
    pub started_at: DateTime<Local>,
    pub duration_secs: f64,
    pub cameras: Vec<CameraSummary>,
}

impl TrialSummary {
    pub fn total_frames(&self) -> u64 {
        self.cameras.iter().map(|c| c.frames_written).sum()
    }

    pub fn camera(&self, name: &str) -> Option<&CameraSummary> {
        self.cameras.iter().find(|c| c.camera == name)
    }

    /// Log one line per camera at info level, failures at warn.
    pub fn log(&self) {
        log::info!(
            "Trial '{}' finished after {:.1}s ({} frame(s) total)",
            self.trial,
            self.duration_secs,
            self.total_frames()
        );
        for camera in &self.cameras {
            match (&camera.stats, &camera.error) {
                (Some(stats), None) => log::info!(
                    "  {}: {} frame(s), {} missed tick(s), {} bytes -> {}",
                    camera.camera,
                    camera.frames_written,
                    camera.missed_ticks(),
                    stats.bytes_written,
                    camera.path.display()
                ),
                (_, Some(error)) => log::warn!(
                    "  {}: stopped after {} frame(s): {}",
                    camera.camera,
                    camera.frames_written,
                    error
                ),
                (None, None) => log::info!(
                    "  {}: {} frame(s) -> {}",
                    camera.camera,
                    camera.frames_written,
                    camera.path.display()
                ),
            }
        }
    }
}
