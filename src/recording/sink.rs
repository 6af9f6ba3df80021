//! Per-camera output streams
//!
//! A [`VideoSink`] is bound to one file and one frame size for the length of a
//! trial. Sinks are created through a [`SinkFactory`] so the recording session
//! never depends on a concrete container.

use std::fs;
use std::path::{Path, PathBuf};

use super::config::{RecordingConfig, RecordingStats};
use crate::errors::CameraError;
use crate::types::Frame;

/// Append-only video output for one camera and one trial.
pub trait VideoSink {
    fn path(&self) -> &Path;

    /// Append one frame. Frames of a different size are conformed first.
    fn append(&mut self, frame: &Frame) -> Result<(), CameraError>;

    fn frames_written(&self) -> u64;

    /// Flush and close the file. Consumes the sink so it finalizes once.
    fn finish(self: Box<Self>) -> Result<RecordingStats, CameraError>;

    /// Abandon the output: finalize and remove the file.
    fn discard(self: Box<Self>) {
        let path = self.path().to_path_buf();
        if let Err(e) = self.finish() {
            log::debug!("Finalizing discarded sink {} failed: {}", path.display(), e);
        }
        if let Err(e) = fs::remove_file(&path) {
            log::warn!("Could not remove abandoned output {}: {}", path.display(), e);
        }
    }
}

/// Opens sinks for a given container format.
pub trait SinkFactory {
    /// File extension without the dot, e.g. `mp4`
    fn extension(&self) -> &str;

    /// Create a new output at `path`. Must fail rather than overwrite.
    fn open(&self, path: &Path, config: &RecordingConfig) -> Result<Box<dyn VideoSink>, CameraError>;
}

/// `<root>/<camera>/<trial>_<camera>.<ext>`
pub fn trial_path(root: &Path, camera: &str, trial: &str, extension: &str) -> PathBuf {
    root.join(camera)
        .join(format!("{}_{}.{}", trial, camera, extension))
}

/// Borrow `frame` if it already has the target size, otherwise resize a copy.
pub fn conform<'f>(frame: &'f Frame, width: u32, height: u32) -> std::borrow::Cow<'f, Frame> {
    if frame.dimensions() == (width, height) {
        std::borrow::Cow::Borrowed(frame)
    } else {
        std::borrow::Cow::Owned(frame.resized(width, height))
    }
}
