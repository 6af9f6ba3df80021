//! Testing utilities for trialcam
//!
//! Everything here runs without camera hardware, an encoder or a terminal:
//! synthetic frames, a scripted camera backend, an in-memory sink factory
//! and a scripted operator. All of them write to a shared [`EventLog`] so
//! tests can check the order in which resources were opened and released.

pub mod memory_sink;
pub mod scripted;
pub mod synthetic_data;

pub use memory_sink::{MemorySink, MemorySinkFactory};
pub use scripted::{EventLog, ReadScript, ScriptedBackend, ScriptedUi};
pub use synthetic_data::{noise_frame, synthetic_frame};
