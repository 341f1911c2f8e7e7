use serde::{Deserialize, Serialize};

/// Highest valid MIDI pitch.
pub const MAX_PITCH: u8 = 127;
/// Highest valid MIDI velocity.
pub const MAX_VELOCITY: u8 = 127;

/// A single MIDI note. Immutable once emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Note {
    pub pitch: u8,
    pub velocity: u8,
    #[serde(default)]
    pub is_control_change: bool,
}

impl Note {
    /// Build a note, clamping pitch and velocity into MIDI range.
    pub fn new(pitch: i32, velocity: i32) -> Self {
        Self {
            pitch: clamp_pitch(pitch),
            velocity: clamp_velocity(velocity),
            is_control_change: false,
        }
    }

    pub fn control_change(controller: u8, value: u8) -> Self {
        Self {
            pitch: controller.min(MAX_PITCH),
            velocity: value.min(MAX_VELOCITY),
            is_control_change: true,
        }
    }
}

/// Clamp an arbitrary (possibly offset) pitch into 0..=127.
pub fn clamp_pitch(pitch: i32) -> u8 {
    pitch.clamp(0, MAX_PITCH as i32) as u8
}

/// Clamp a velocity into 0..=127.
pub fn clamp_velocity(velocity: i32) -> u8 {
    velocity.clamp(0, MAX_VELOCITY as i32) as u8
}
