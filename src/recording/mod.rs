//! Trial recording
//!
//! [`RecordingSession`] owns the per-trial sinks and the idle/recording state.
//! Sinks come from a [`SinkFactory`]; with the `recording` feature the MP4
//! factory encodes with openh264 and muxes with muxide.
//!
//! # Example
//! ```rust,ignore
//! use trialcam::recording::{Mp4SinkFactory, RecordingConfig, RecordingSession};
//!
//! let mut session = RecordingSession::new(
//!     Box::new(Mp4SinkFactory),
//!     "data",
//!     RecordingConfig::new(640, 480, 30.0),
//! );
//! session.start("T1", &registry)?;
//! // every tick:
//! session.write_if_active(&registry.read_all());
//! let summary = session.stop()?;
//! ```

mod config;
#[cfg(feature = "recording")]
mod encoder;
#[cfg(feature = "recording")]
mod mp4;
mod session;
mod sink;

pub use config::{CameraSummary, RecordingConfig, RecordingStats, TrialSummary};
#[cfg(feature = "recording")]
pub use encoder::{EncodedFrame, H264Encoder};
#[cfg(feature = "recording")]
pub use mp4::{Mp4Sink, Mp4SinkFactory};
pub use session::{RecordingSession, SessionState};
pub use sink::{conform, trial_path, SinkFactory, VideoSink};

#[cfg(test)]
mod tests;
