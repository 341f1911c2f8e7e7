//! # arpy-types
//!
//! Shared type definitions for the Arpy arpeggiation engine.
//! This crate contains the plain data exchanged between arpy-core and its
//! collaborators (controllers feeding held notes in, sinks consuming note events).

pub mod action;
mod event;
mod mode;
mod note;
pub mod preset;
mod routing;

pub use action::{EngineCommand, Target};
pub use event::ScheduledEvent;
pub use mode::{PatternMode, StepRate};
pub use note::{clamp_pitch, clamp_velocity, Note, MAX_PITCH, MAX_VELOCITY};
pub use preset::{InstancePreset, PresetBank};
pub use routing::{DeviceId, Route, MAX_CHANNEL};

/// Unique identifier for an arpeggiator instance within a pool.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct InstanceId(u32);

impl InstanceId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
    pub fn get(self) -> u32 {
        self.0
    }
    /// Position of this instance in its pool.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
