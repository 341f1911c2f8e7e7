//! Commands accepted by the engine.
//!
//! Every input a collaborator can send (held-note changes and parameter edits)
//! is one `EngineCommand`. Targets are passed explicitly with each command;
//! there is no process-wide "active instance" flag.

use serde::{Deserialize, Serialize};

use crate::{DeviceId, InstanceId, InstancePreset, PatternMode, StepRate};

/// Which instances a broadcast reaches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    #[default]
    All,
    Only(Vec<InstanceId>),
}

impl Target {
    pub fn one(id: InstanceId) -> Self {
        Target::Only(vec![id])
    }

    pub fn includes(&self, id: InstanceId) -> bool {
        match self {
            Target::All => true,
            Target::Only(ids) => ids.contains(&id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineCommand {
    // ── Held notes ────────────────────────────────────────────────
    NoteOn {
        pitch: u8,
        velocity: u8,
        target: Target,
    },
    NoteOff {
        pitch: u8,
        target: Target,
    },
    /// Drop every held note, latched or not.
    Clear { target: Target },
    /// Silence immediately: flush pending note-offs and clear held notes.
    Stop { target: Target },

    // ── Per-instance parameters ───────────────────────────────────
    SetMode {
        instance: InstanceId,
        mode: PatternMode,
    },
    /// BPM outside 20-999 is clamped.
    SetTempo { instance: InstanceId, bpm: u32 },
    /// Semitones outside -12..=12 are clamped.
    SetRootOffset { instance: InstanceId, semitones: i32 },
    SetLatch { instance: InstanceId, enabled: bool },
    SetRouting {
        instance: InstanceId,
        channel: u8,
        device: DeviceId,
    },
    SetRate { instance: InstanceId, rate: StepRate },
    SetGate { instance: InstanceId, gate: f32 },
    SetOctaveSpread { instance: InstanceId, octaves: u8 },
    ApplyPreset {
        instance: InstanceId,
        preset: InstancePreset,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_includes() {
        let a = InstanceId::new(0);
        let b = InstanceId::new(3);
        assert!(Target::All.includes(b));
        assert!(Target::one(a).includes(a));
        assert!(!Target::one(a).includes(b));
        assert!(!Target::Only(Vec::new()).includes(a));
    }
}
