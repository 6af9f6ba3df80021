//! In-memory sink factory
//!
//! Sinks create their output file (so collision checks behave like the real
//! thing) but keep frames in memory and write only a frame count on finish.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use super::EventLog;
use crate::errors::CameraError;
use crate::recording::{RecordingConfig, RecordingStats, SinkFactory, VideoSink};
use crate::types::Frame;

#[derive(Debug, Clone)]
pub struct MemorySinkFactory {
    log: EventLog,
    fail_open: Vec<String>,
    fail_write_after: BTreeMap<String, u64>,
}

impl MemorySinkFactory {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            fail_open: Vec::new(),
            fail_write_after: BTreeMap::new(),
        }
    }

    /// Opening the sink for `camera` fails.
    pub fn fail_open_for(mut self, camera: impl Into<String>) -> Self {
        self.fail_open.push(camera.into());
        self
    }

    /// The sink for `camera` accepts `n` frames, then every append fails.
    pub fn fail_write_after(mut self, camera: impl Into<String>, n: u64) -> Self {
        self.fail_write_after.insert(camera.into(), n);
        self
    }
}

/// Camera folder the sink lives in, i.e. `<root>/<camera>/<file>`
fn camera_of(path: &Path) -> String {
    path.parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl SinkFactory for MemorySinkFactory {
    fn extension(&self) -> &str {
        "mem"
    }

    fn open(&self, path: &Path, config: &RecordingConfig) -> Result<Box<dyn VideoSink>, CameraError> {
        let camera = camera_of(path);
        if self.fail_open.contains(&camera) {
            return Err(CameraError::SinkOpenError(format!(
                "scripted open failure for {}",
                camera
            )));
        }

        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| {
                CameraError::SinkOpenError(format!("Failed to create {}: {}", path.display(), e))
            })?;

        self.log.push(format!("open:{}", camera));
        Ok(Box::new(MemorySink {
            path: path.to_path_buf(),
            size: config.frame_size(),
            fail_after: self.fail_write_after.get(&camera).copied(),
            camera,
            frames: Vec::new(),
            resized: 0,
            log: self.log.clone(),
        }))
    }
}

pub struct MemorySink {
    path: PathBuf,
    camera: String,
    size: (u32, u32),
    fail_after: Option<u64>,
    frames: Vec<Frame>,
    resized: u64,
    log: EventLog,
}

impl MemorySink {
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}

impl VideoSink for MemorySink {
    fn path(&self) -> &Path {
        &self.path
    }

    fn append(&mut self, frame: &Frame) -> Result<(), CameraError> {
        if self.fail_after.is_some_and(|n| self.frames.len() as u64 >= n) {
            return Err(CameraError::SinkWriteError(format!(
                "scripted write failure for {}",
                self.camera
            )));
        }

        let (width, height) = self.size;
        let frame = crate::recording::conform(frame, width, height);
        if matches!(frame, std::borrow::Cow::Owned(_)) {
            self.resized += 1;
        }
        self.frames.push(frame.into_owned());
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames.len() as u64
    }

    fn finish(self: Box<Self>) -> Result<RecordingStats, CameraError> {
        let contents = format!("{}\n", self.frames.len());
        fs::write(&self.path, &contents)?;
        self.log.push(format!("finish:{}", self.camera));

        Ok(RecordingStats {
            video_frames: self.frames.len() as u64,
            dropped_frames: 0,
            resized_frames: self.resized,
            duration_secs: 0.0,
            bytes_written: contents.len() as u64,
            output_path: self.path,
        })
    }

    fn discard(self: Box<Self>) {
        self.log.push(format!("discard:{}", self.camera));
        let _ = fs::remove_file(&self.path);
    }
}
