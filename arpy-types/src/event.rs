use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{InstanceId, Note, Route};

/// A note event emitted by the engine.
///
/// Produced for collaborators through `NoteSink`; the engine does not retain
/// events after emission. `timestamp` is logical time since the engine started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub source: InstanceId,
    pub note: Note,
    pub is_note_off: bool,
    pub timestamp: Duration,
    /// Destination resolved when the note-on was emitted. The matching
    /// note-off always carries the same route.
    pub route: Route,
}

impl ScheduledEvent {
    pub fn pitch(&self) -> u8 {
        self.note.pitch
    }

    pub fn velocity(&self) -> u8 {
        self.note.velocity
    }

    pub fn is_note_on(&self) -> bool {
        !self.is_note_off
    }
}
