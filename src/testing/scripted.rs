//! Scripted camera backend and operator
//!
//! Event names written to the [`EventLog`]:
//! `device-open:<id>`, `release:<id>` from devices, `display-close` from the
//! scripted UI. Sinks from [`super::MemorySinkFactory`] add `open:`,
//! `finish:` and `discard:` entries.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::synthetic_frame;
use crate::errors::CameraError;
use crate::platform::{CameraBackend, CameraDevice, OpenParams};
use crate::preview::PreviewSurface;
use crate::types::{CameraId, Frame};
use crate::ui::{Command, CommandSource, Display, Prompt};

/// Shared, ordered record of resource events.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.into());
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of events starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }

    /// Position of the first event starting with `prefix`
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.events().iter().position(|e| e.starts_with(prefix))
    }

    /// Position of the last event starting with `prefix`
    pub fn last_position(&self, prefix: &str) -> Option<usize> {
        self.events().iter().rposition(|e| e.starts_with(prefix))
    }
}

/// How a scripted device answers reads.
#[derive(Debug, Clone)]
pub enum ReadScript {
    Always,
    Never,
    /// Cycles through the pattern; `true` yields a frame.
    Pattern(Vec<bool>),
    /// Succeeds `n` times, then fails forever.
    FailAfter(u64),
}

impl ReadScript {
    fn succeeds(&self, read_index: u64) -> bool {
        match self {
            ReadScript::Always => true,
            ReadScript::Never => false,
            ReadScript::Pattern(pattern) if pattern.is_empty() => false,
            ReadScript::Pattern(pattern) => pattern[(read_index % pattern.len() as u64) as usize],
            ReadScript::FailAfter(n) => read_index < *n,
        }
    }
}

/// In-memory [`CameraBackend`] whose devices follow a [`ReadScript`].
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    name: String,
    log: EventLog,
    cameras: BTreeMap<CameraId, ReadScript>,
    unopenable: BTreeSet<CameraId>,
    frame_size: Option<(u32, u32)>,
}

impl ScriptedBackend {
    pub fn new(log: EventLog) -> Self {
        Self {
            name: "scripted".to_string(),
            log,
            cameras: BTreeMap::new(),
            unopenable: BTreeSet::new(),
            frame_size: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_camera(mut self, id: CameraId, script: ReadScript) -> Self {
        self.cameras.insert(id, script);
        self
    }

    pub fn unopenable(mut self, id: CameraId) -> Self {
        self.unopenable.insert(id);
        self
    }

    /// Produce frames of this size instead of the requested one.
    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.frame_size = Some((width, height));
        self
    }
}

impl CameraBackend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self, id: CameraId, params: &OpenParams) -> Result<Box<dyn CameraDevice>, CameraError> {
        let script = match self.cameras.get(&id) {
            Some(script) if !self.unopenable.contains(&id) => script.clone(),
            _ => {
                return Err(CameraError::DeviceUnavailable(format!(
                    "no scripted camera at index {}",
                    id
                )))
            }
        };

        self.log.push(format!("device-open:{}", id));
        let (width, height) = self.frame_size.unwrap_or((params.width, params.height));
        Ok(Box::new(ScriptedDevice {
            id,
            script,
            reads: 0,
            width,
            height,
            log: self.log.clone(),
        }))
    }
}

struct ScriptedDevice {
    id: CameraId,
    script: ReadScript,
    reads: u64,
    width: u32,
    height: u32,
    log: EventLog,
}

impl CameraDevice for ScriptedDevice {
    fn id(&self) -> CameraId {
        self.id
    }

    fn read(&mut self) -> Result<Frame, CameraError> {
        let index = self.reads;
        self.reads += 1;
        if self.script.succeeds(index) {
            Ok(synthetic_frame(index, self.width, self.height))
        } else {
            Err(CameraError::ReadError(format!("scripted failure on camera {}", self.id)))
        }
    }

    fn release(&mut self) {
        self.log.push(format!("release:{}", self.id));
    }
}

/// Operator stand-in: queued commands, queued answers, recorded output.
///
/// Once the command queue runs dry every poll returns [`Command::Quit`], so
/// a capture loop driven by it always terminates.
#[derive(Debug, Default)]
pub struct ScriptedUi {
    log: EventLog,
    commands: VecDeque<Option<Command>>,
    answers: VecDeque<String>,
    close_after_shows: Option<usize>,
    failing_polls: usize,
    failing_asks: usize,
    pub shows: usize,
    pub surfaces_shown: usize,
    pub recording_shows: usize,
    pub statuses: Vec<String>,
    pub questions: Vec<String>,
    pub closed: bool,
}

impl ScriptedUi {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    /// Queue one poll result; `None` is a tick without a key press.
    pub fn then(mut self, command: Option<Command>) -> Self {
        self.commands.push_back(command);
        self
    }

    /// Queue `n` ticks without key presses.
    pub fn idle(mut self, n: usize) -> Self {
        self.commands.extend(std::iter::repeat(None).take(n));
        self
    }

    pub fn answer(mut self, text: impl Into<String>) -> Self {
        self.answers.push_back(text.into());
        self
    }

    /// Make the next `n` polls fail before the command queue is consulted.
    pub fn failing_polls(mut self, n: usize) -> Self {
        self.failing_polls = n;
        self
    }

    /// Make the next `n` questions fail before any answer is used.
    pub fn failing_asks(mut self, n: usize) -> Self {
        self.failing_asks = n;
        self
    }

    /// Report a close request once `n` surfaces have been shown.
    pub fn close_after(mut self, n: usize) -> Self {
        self.close_after_shows = Some(n);
        self
    }
}

impl Display for ScriptedUi {
    fn show(&mut self, surface: Option<&PreviewSurface>, status: &str) -> Result<(), CameraError> {
        self.shows += 1;
        if let Some(surface) = surface {
            self.surfaces_shown += 1;
            if surface.recording {
                self.recording_shows += 1;
            }
        }
        self.statuses.push(status.to_string());
        Ok(())
    }

    fn close_requested(&self) -> bool {
        self.close_after_shows.is_some_and(|n| self.shows >= n)
    }

    fn close(&mut self) -> Result<(), CameraError> {
        if !self.closed {
            self.closed = true;
            self.log.push("display-close");
        }
        Ok(())
    }
}

impl CommandSource for ScriptedUi {
    fn poll_command(&mut self, _timeout: Duration) -> Result<Option<Command>, CameraError> {
        if self.failing_polls > 0 {
            self.failing_polls -= 1;
            return Err(CameraError::InvalidInput("scripted poll failure".to_string()));
        }
        Ok(self.commands.pop_front().unwrap_or(Some(Command::Quit)))
    }
}

impl Prompt for ScriptedUi {
    fn ask(&mut self, question: &str) -> Result<Option<String>, CameraError> {
        self.questions.push(question.to_string());
        if self.failing_asks > 0 {
            self.failing_asks -= 1;
            return Err(CameraError::InvalidInput("scripted prompt failure".to_string()));
        }
        Ok(self.answers.pop_front())
    }
}
