//! Capture loop
//!
//! Single-threaded: every tick reads all cameras, feeds the recording session
//! with the untouched frames, shows an annotated preview and handles at most
//! one operator command. Quit, a display close request and Ctrl-C all end
//! the loop through the same shutdown path: finalize recording, release
//! cameras, close the display.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{CameraError, RecordingError};
use crate::preview;
use crate::recording::{RecordingSession, TrialSummary};
use crate::registry::CameraRegistry;
use crate::ui::{Command, CommandSource, Display, KeyBindings, Prompt};

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Quit,
    DisplayClosed,
    Interrupted,
}

#[derive(Debug)]
pub struct LoopReport {
    pub exit: ExitReason,
    pub ticks: u64,
    /// Every trial that ended during the run, in order
    pub trials: Vec<TrialSummary>,
}

/// Install a Ctrl-C handler that raises the returned flag.
pub fn install_interrupt_handler() -> Result<Arc<AtomicBool>, CameraError> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .map_err(|e| CameraError::ConfigError(format!("Failed to install Ctrl-C handler: {}", e)))?;
    Ok(flag)
}

pub struct CaptureLoop<U>
where
    U: Display + CommandSource + Prompt,
{
    registry: CameraRegistry,
    session: RecordingSession,
    ui: U,
    keys: KeyBindings,
    tick_interval: Duration,
    preview_height: u32,
    interrupt: Arc<AtomicBool>,
    ticks: u64,
    trials: Vec<TrialSummary>,
    /// Outcome of the last operator action, shown in the status bar
    notice: Option<String>,
    shut_down: bool,
}

impl<U> CaptureLoop<U>
where
    U: Display + CommandSource + Prompt,
{
    pub fn new(registry: CameraRegistry, session: RecordingSession, ui: U) -> Self {
        Self {
            registry,
            session,
            ui,
            keys: KeyBindings::default(),
            tick_interval: Duration::from_millis(1),
            preview_height: 240,
            interrupt: Arc::new(AtomicBool::new(false)),
            ticks: 0,
            trials: Vec::new(),
            notice: None,
            shut_down: false,
        }
    }

    pub fn with_keys(mut self, keys: KeyBindings) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_preview_height(mut self, height: u32) -> Self {
        self.preview_height = height;
        self
    }

    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    pub fn session(&self) -> &RecordingSession {
        &self.session
    }

    pub fn registry(&self) -> &CameraRegistry {
        &self.registry
    }

    /// Message currently shown next to the status line.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Run until quit, close request or interrupt, then shut down.
    pub fn run(&mut self) -> Result<LoopReport, CameraError> {
        log::info!(
            "Capture loop running with {} camera(s); {}",
            self.registry.len(),
            self.keys.help()
        );

        let exit = loop {
            match self.tick() {
                Ok(None) => continue,
                Ok(Some(reason)) => break reason,
                Err(e) => {
                    log::error!("Capture loop failed: {}", e);
                    self.shutdown();
                    return Err(e);
                }
            }
        };

        log::info!("Capture loop ending ({:?}) after {} tick(s)", exit, self.ticks);
        self.shutdown();

        Ok(LoopReport {
            exit,
            ticks: self.ticks,
            trials: std::mem::take(&mut self.trials),
        })
    }

    /// One iteration. Returns the exit reason once the loop should stop.
    pub fn tick(&mut self) -> Result<Option<ExitReason>, CameraError> {
        if self.interrupt.load(Ordering::SeqCst) {
            return Ok(Some(ExitReason::Interrupted));
        }
        self.ticks += 1;

        let frames = self.registry.read_all();

        let was_recording = self.session.is_recording();
        self.session.write_if_active(&frames);
        if was_recording && !self.session.is_recording() {
            if let Some(summary) = self.session.last_summary() {
                self.notice = Some(format!(
                    "Trial '{}' ended: every recording failed",
                    summary.trial
                ));
                self.trials.push(summary.clone());
            }
        }

        let recording = self.session.is_recording();
        let tiles = self
            .registry
            .names()
            .filter_map(|(id, name)| frames.get(&id).map(|frame| (id, name.as_str(), frame)));
        let surface = preview::compose(tiles, self.preview_height, recording);
        let status = self.status_line(frames.len());

        if let Err(e) = self.ui.show(surface.as_ref(), &status) {
            log::warn!("Failed to update preview: {}", e);
        }
        if self.ui.close_requested() {
            return Ok(Some(ExitReason::DisplayClosed));
        }

        let command = match self.ui.poll_command(self.tick_interval) {
            Ok(command) => command,
            Err(e) => {
                log::warn!("Failed to read operator input: {}", e);
                self.notice = Some(format!("Input error: {}", e));
                None
            }
        };

        match command {
            Some(Command::StartRecording) => self.handle_start(),
            Some(Command::StopRecording) => self.handle_stop(),
            Some(Command::Quit) => return Ok(Some(ExitReason::Quit)),
            None => {}
        }

        Ok(None)
    }

    fn handle_start(&mut self) {
        if let Some(trial) = self.session.trial_name() {
            log::warn!("Already recording trial '{}'", trial);
            self.notice = Some(format!("Already recording '{}'", trial));
            return;
        }

        let answer = match self.ui.ask("Enter trial name: ") {
            Ok(Some(answer)) => answer,
            Ok(None) => {
                log::info!("No trial name entered, recording not started");
                self.notice = Some("No trial name entered".to_string());
                return;
            }
            Err(e) => {
                log::warn!("Failed to read trial name: {}", e);
                self.notice = Some(format!("Input error: {}", e));
                return;
            }
        };
        if answer.trim().is_empty() {
            self.notice = None;
            return;
        }

        self.notice = match self.session.start(&answer, &self.registry) {
            Ok(()) => Some(format!("Recording '{}'", answer.trim())),
            Err(RecordingError::EmptyTrialName) => None,
            Err(e) => {
                log::warn!("Could not start recording: {}", e);
                Some(format!("Not started: {}", e))
            }
        };
    }

    fn handle_stop(&mut self) {
        self.notice = match self.session.stop() {
            Ok(summary) => {
                let notice = format!(
                    "Saved trial '{}' ({} frame(s))",
                    summary.trial,
                    summary.total_frames()
                );
                self.trials.push(summary);
                Some(notice)
            }
            Err(RecordingError::NotRecording) => {
                log::info!("Not recording");
                Some("Not recording".to_string())
            }
            Err(e) => {
                log::warn!("Could not stop recording: {}", e);
                Some(format!("Stop failed: {}", e))
            }
        };
    }

    fn status_line(&self, readable: usize) -> String {
        let line = match self.session.trial_name() {
            Some(trial) => format!(
                "REC '{}' | {}/{} camera(s) | {}",
                trial,
                self.session.active_cameras().len(),
                self.registry.len(),
                self.keys.help()
            ),
            None => format!(
                "Idle | {}/{} camera(s) readable | {}",
                readable,
                self.registry.len(),
                self.keys.help()
            ),
        };
        match &self.notice {
            Some(notice) => format!("{} | {}", line, notice),
            None => line,
        }
    }

    /// Finalize recording, release cameras, close the display. Runs once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        if self.session.is_recording() {
            match self.session.stop() {
                Ok(summary) => self.trials.push(summary),
                Err(e) => log::warn!("Could not stop recording: {}", e),
            }
        }
        self.registry.shutdown();
        if let Err(e) = self.ui.close() {
            log::warn!("Failed to close display: {}", e);
        }
    }
}

impl<U> Drop for CaptureLoop<U>
where
    U: Display + CommandSource + Prompt,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}
