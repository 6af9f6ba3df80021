//! MP4 sink: openh264 encoding muxed with muxide

use std::fs::{File, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use muxide::api::{Metadata, Muxer, MuxerBuilder, VideoCodec};

use super::config::{RecordingConfig, RecordingStats};
use super::encoder::H264Encoder;
use super::sink::{conform, SinkFactory, VideoSink};
use crate::errors::CameraError;
use crate::types::Frame;

/// Writes H.264 in an MP4 container at a fixed frame size and rate
pub struct Mp4Sink {
    encoder: H264Encoder,
    muxer: Muxer<BufWriter<File>>,
    config: RecordingConfig,
    path: PathBuf,
    frame_count: u64,
    dropped_frames: u64,
    resized_frames: u64,
    frame_duration_secs: f64,
}

impl Mp4Sink {
    /// Create the file at `path`; fails if it already exists.
    pub fn create(path: &Path, config: RecordingConfig) -> Result<Self, CameraError> {
        let encoder = H264Encoder::new(config.width, config.height, config.fps, config.bitrate)?;

        let muxer = create_new_with(path, |file| {
            let mut metadata = Metadata::new().with_current_time();
            if let Some(ref title) = config.title {
                metadata = metadata.with_title(title);
            }

            MuxerBuilder::new(BufWriter::new(file))
                .video(VideoCodec::H264, config.width, config.height, config.fps)
                .with_fast_start(config.fast_start)
                .with_metadata(metadata)
                .build()
                .map_err(|e| CameraError::MuxingError(format!("Failed to create muxer: {}", e)))
        })?;

        log::debug!(
            "Opened {} ({}x{} @ {} fps)",
            path.display(),
            config.width,
            config.height,
            config.fps
        );

        Ok(Self {
            encoder,
            muxer,
            frame_duration_secs: 1.0 / config.fps,
            config,
            path: path.to_path_buf(),
            frame_count: 0,
            dropped_frames: 0,
            resized_frames: 0,
        })
    }
}

impl VideoSink for Mp4Sink {
    fn path(&self) -> &Path {
        &self.path
    }

    fn append(&mut self, frame: &Frame) -> Result<(), CameraError> {
        let (width, height) = self.config.frame_size();
        let frame = conform(frame, width, height);
        if matches!(frame, std::borrow::Cow::Owned(_)) {
            self.resized_frames += 1;
        }

        let encoded = self.encoder.encode_rgb(frame.data())?;

        // Frame skipping is disabled, so this only happens on an encoder fault
        if encoded.data.is_empty() {
            self.dropped_frames += 1;
            log::warn!("Encoder produced no output for a frame of {}", self.path.display());
            return Ok(());
        }

        // PTS follows frame count so playback runs at the configured rate
        let pts = self.frame_count as f64 * self.frame_duration_secs;
        self.muxer
            .write_video(pts, &encoded.data, encoded.is_keyframe)
            .map_err(|e| CameraError::SinkWriteError(format!("Failed to write frame: {}", e)))?;

        self.frame_count += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frame_count
    }

    fn finish(self: Box<Self>) -> Result<RecordingStats, CameraError> {
        let this = *self;
        let muxer_stats = this.muxer.finish_with_stats().map_err(|e| {
            CameraError::MuxingError(format!("Failed to finalize recording: {}", e))
        })?;

        log::debug!("Finalized {}", this.path.display());

        Ok(RecordingStats {
            video_frames: muxer_stats.video_frames,
            dropped_frames: this.dropped_frames,
            resized_frames: this.resized_frames,
            duration_secs: muxer_stats.duration_secs,
            bytes_written: muxer_stats.bytes_written,
            output_path: this.path,
        })
    }
}

/// Create `path` exclusively and hand it to `init`. If `init` fails the new
/// file is removed again, so a failed open never blocks a later one.
fn create_new_with<T>(
    path: &Path,
    init: impl FnOnce(File) -> Result<T, CameraError>,
) -> Result<T, CameraError> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            CameraError::SinkOpenError(format!("Failed to create {}: {}", path.display(), e))
        })?;

    init(file).map_err(|e| {
        if let Err(rm) = std::fs::remove_file(path) {
            log::warn!("Could not remove {} after failed open: {}", path.display(), rm);
        }
        e
    })
}

/// Factory for [`Mp4Sink`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct Mp4SinkFactory;

impl SinkFactory for Mp4SinkFactory {
    fn extension(&self) -> &str {
        "mp4"
    }

    fn open(&self, path: &Path, config: &RecordingConfig) -> Result<Box<dyn VideoSink>, CameraError> {
        Ok(Box::new(Mp4Sink::create(path, config.clone())?))
    }
}
