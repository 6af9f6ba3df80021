//! Trial recording state machine
//!
//! A session is either idle or recording one named trial. Starting a trial
//! opens one sink per registry camera at
//! `<output_root>/<camera>/<trial>_<camera>.<ext>`; the start is atomic, so a
//! rejected start never leaves a sink open or a partial file behind.
//! Stopping finalizes every sink and returns a [`TrialSummary`].

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Local};

use super::config::{CameraSummary, RecordingConfig, TrialSummary};
use super::sink::{trial_path, SinkFactory, VideoSink};
use crate::assert_invariant;
use crate::errors::RecordingError;
use crate::registry::CameraRegistry;
use crate::types::{validate_label, CameraId, CameraName, Frame};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
}

struct ActiveSink {
    name: CameraName,
    sink: Box<dyn VideoSink>,
    ticks: u64,
}

struct ActiveTrial {
    name: String,
    started_at: DateTime<Local>,
    started: Instant,
    sinks: BTreeMap<CameraId, ActiveSink>,
    /// Cameras whose sink failed mid-trial
    lost: Vec<CameraSummary>,
}

pub struct RecordingSession {
    factory: Box<dyn SinkFactory>,
    output_root: PathBuf,
    config: RecordingConfig,
    trial: Option<ActiveTrial>,
    last_summary: Option<TrialSummary>,
}

impl RecordingSession {
    pub fn new(
        factory: Box<dyn SinkFactory>,
        output_root: impl Into<PathBuf>,
        config: RecordingConfig,
    ) -> Self {
        Self {
            factory,
            output_root: output_root.into(),
            config,
            trial: None,
            last_summary: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.trial.is_some() {
            SessionState::Recording
        } else {
            SessionState::Idle
        }
    }

    pub fn is_recording(&self) -> bool {
        self.trial.is_some()
    }

    pub fn trial_name(&self) -> Option<&str> {
        self.trial.as_ref().map(|t| t.name.as_str())
    }

    /// Cameras with an open sink, ascending id
    pub fn active_cameras(&self) -> Vec<CameraId> {
        self.trial
            .as_ref()
            .map(|t| t.sinks.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn frames_written(&self, id: CameraId) -> Option<u64> {
        self.trial
            .as_ref()
            .and_then(|t| t.sinks.get(&id))
            .map(|active| active.sink.frames_written())
    }

    /// Summary of the most recently ended trial
    pub fn last_summary(&self) -> Option<&TrialSummary> {
        self.last_summary.as_ref()
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Begin recording `trial_name` on every camera in `registry`.
    pub fn start(&mut self, trial_name: &str, registry: &CameraRegistry) -> Result<(), RecordingError> {
        if let Some(trial) = &self.trial {
            log::warn!("Already recording trial '{}'", trial.name);
            return Err(RecordingError::AlreadyRecording {
                trial: trial.name.clone(),
            });
        }

        if trial_name.trim().is_empty() {
            return Err(RecordingError::EmptyTrialName);
        }
        let trial = validate_label(trial_name)
            .map_err(|msg| RecordingError::InvalidTrialName(format!("trial name {}", msg)))?;

        if registry.is_empty() {
            return Err(RecordingError::NoCameras);
        }

        let planned = self.plan_outputs(&trial, registry)?;

        let mut sinks = BTreeMap::new();
        for (id, name, path) in planned {
            match self.open_sink(&trial, &name, &path) {
                Ok(sink) => {
                    sinks.insert(id, ActiveSink { name, sink, ticks: 0 });
                }
                Err(source) => {
                    log::error!("Could not open output for '{}': {}", name, source);
                    for (_, opened) in sinks {
                        opened.sink.discard();
                    }
                    return Err(RecordingError::SinkOpen { camera: name, source });
                }
            }
        }

        assert_invariant!(
            !sinks.is_empty(),
            "Recording session has sinks exactly while recording",
            "RecordingSession::start"
        );

        log::info!("Recording started: trial '{}' on {} camera(s)", trial, sinks.len());
        self.trial = Some(ActiveTrial {
            name: trial,
            started_at: Local::now(),
            started: Instant::now(),
            sinks,
            lost: Vec::new(),
        });
        Ok(())
    }

    /// Finalize every sink and return to idle.
    pub fn stop(&mut self) -> Result<TrialSummary, RecordingError> {
        let trial = self.trial.take().ok_or(RecordingError::NotRecording)?;
        let summary = finalize(trial);
        summary.log();
        self.last_summary = Some(summary.clone());
        Ok(summary)
    }

    /// Append this tick's frames to the active sinks. Returns how many were written.
    ///
    /// Cameras with no frame this tick are skipped. A sink that fails to
    /// write is finalized early and dropped from the trial; losing the last
    /// one ends the trial.
    pub fn write_if_active(&mut self, frames: &BTreeMap<CameraId, Frame>) -> usize {
        let Some(trial) = self.trial.as_mut() else {
            return 0;
        };

        let mut written = 0;
        let mut failed = Vec::new();

        for (&id, active) in trial.sinks.iter_mut() {
            active.ticks += 1;
            let Some(frame) = frames.get(&id) else {
                continue;
            };
            match active.sink.append(frame) {
                Ok(()) => written += 1,
                Err(e) => {
                    log::error!("Write to '{}' failed, closing its output: {}", active.name, e);
                    failed.push((id, e.to_string()));
                }
            }
        }

        for (id, error) in failed {
            if let Some(active) = trial.sinks.remove(&id) {
                let mut summary = finalize_sink(id, active);
                summary.error = Some(error);
                trial.lost.push(summary);
            }
        }

        if trial.sinks.is_empty() {
            log::warn!("Every camera output failed; ending trial '{}'", trial.name);
            if let Some(trial) = self.trial.take() {
                let summary = finalize(trial);
                summary.log();
                self.last_summary = Some(summary);
            }
        }

        assert_invariant!(
            self.trial.as_ref().map_or(true, |t| !t.sinks.is_empty()),
            "Recording session has sinks exactly while recording",
            "RecordingSession::write_if_active"
        );

        written
    }

    /// Output paths for every registry camera, checked before anything is opened.
    fn plan_outputs(
        &self,
        trial: &str,
        registry: &CameraRegistry,
    ) -> Result<Vec<(CameraId, CameraName, PathBuf)>, RecordingError> {
        let extension = self.factory.extension();
        let mut seen = BTreeSet::new();
        let mut planned = Vec::with_capacity(registry.len());

        for (id, name) in registry.names() {
            let path = trial_path(&self.output_root, name.as_str(), trial, extension);
            if !seen.insert(path.clone()) {
                return Err(RecordingError::PathCollision { path });
            }
            if path.exists() {
                return Err(RecordingError::TrialExists { path });
            }
            planned.push((id, name.clone(), path));
        }

        Ok(planned)
    }

    fn open_sink(
        &self,
        trial: &str,
        camera: &CameraName,
        path: &Path,
    ) -> Result<Box<dyn VideoSink>, crate::errors::CameraError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let config = self
            .config
            .clone()
            .with_title(format!("{} - {}", trial, camera));
        self.factory.open(path, &config)
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if self.is_recording() {
            log::warn!("Recording session dropped mid-trial, finalizing outputs");
            let _ = self.stop();
        }
    }
}

fn finalize_sink(id: CameraId, active: ActiveSink) -> CameraSummary {
    let path = active.sink.path().to_path_buf();
    let frames_written = active.sink.frames_written();
    let mut summary = CameraSummary {
        id,
        camera: active.name.to_string(),
        path,
        ticks: active.ticks,
        frames_written,
        stats: None,
        error: None,
    };
    match active.sink.finish() {
        Ok(stats) => summary.stats = Some(stats),
        Err(e) => {
            log::error!("Failed to finalize output for '{}': {}", active.name, e);
            summary.error = Some(e.to_string());
        }
    }
    summary
}

fn finalize(trial: ActiveTrial) -> TrialSummary {
    let mut cameras = trial.lost;
    for (id, active) in trial.sinks {
        cameras.push(finalize_sink(id, active));
    }
    cameras.sort_by_key(|c| c.id);

    TrialSummary {
        trial: trial.name,
        started_at: trial.started_at,
        duration_secs: trial.started.elapsed().as_secs_f64(),
        cameras,
    }
}
