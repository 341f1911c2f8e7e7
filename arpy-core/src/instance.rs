//! One independent arpeggiator voice.
//!
//! An instance owns its held notes, latch flag, pattern generator and cursor,
//! tempo, subdivision, gate and root offset. It knows nothing about time or
//! routing: the clock asks it for the next step and schedules the result.

use std::time::Duration;

use arpy_types::{InstanceId, InstancePreset, Note, PatternMode, StepRate};

use crate::error::EngineError;
use crate::note_set::{NoteSet, Snapshot};
use crate::pattern::{PatternError, PatternGenerator};

pub const MIN_BPM: u16 = 20;
pub const MAX_BPM: u16 = 999;
pub const MIN_ROOT_OFFSET: i8 = -12;
pub const MAX_ROOT_OFFSET: i8 = 12;
pub const MIN_GATE: f32 = 0.05;
pub const MAX_GATE: f32 = 1.0;
pub const MIN_OCTAVE_SPREAD: u8 = 1;
pub const MAX_OCTAVE_SPREAD: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// No held notes.
    Idle,
    /// Held notes, following the physical keys.
    Running,
    /// Held notes sustained independently of the physical keys.
    Latched,
}

/// A change of [`InstanceState`] caused by a held-note or latch update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub id: InstanceId,
    pub from: InstanceState,
    pub to: InstanceState,
}

impl Transition {
    pub fn started(&self) -> bool {
        self.from == InstanceState::Idle && self.to != InstanceState::Idle
    }

    pub fn stopped(&self) -> bool {
        self.from != InstanceState::Idle && self.to == InstanceState::Idle
    }
}

#[derive(Debug, Clone)]
pub struct ArpeggiatorInstance {
    id: InstanceId,
    notes: NoteSet,
    generator: PatternGenerator,
    cursor: usize,
    bpm: u16,
    root_offset: i8,
    rate: StepRate,
    gate: f32,
}

impl ArpeggiatorInstance {
    pub fn new(id: InstanceId, preset: &InstancePreset, seed: u64) -> Self {
        let mut instance = Self {
            id,
            notes: NoteSet::new(),
            generator: PatternGenerator::new(preset.mode, preset.octave_spread, seed),
            cursor: 0,
            bpm: 120,
            root_offset: 0,
            rate: preset.rate,
            gate: 0.8,
        };
        instance.apply_preset(preset);
        instance
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn state(&self) -> InstanceState {
        if self.notes.is_empty() {
            InstanceState::Idle
        } else if self.notes.is_latched() {
            InstanceState::Latched
        } else {
            InstanceState::Running
        }
    }

    pub fn is_idle(&self) -> bool {
        self.notes.is_empty()
    }

    // ── Held notes ────────────────────────────────────────────────

    /// Press a key. Velocity 0 is a release; pitches above 127 are ignored.
    pub fn note_on(&mut self, pitch: u8, velocity: u8) -> Option<Transition> {
        if velocity == 0 {
            return self.note_off(pitch);
        }
        if pitch > arpy_types::MAX_PITCH {
            log::warn!(target: "arpy::instance", "instance {}: ignoring note-on for invalid pitch {}", self.id, pitch);
            return None;
        }
        let velocity = velocity.min(arpy_types::MAX_VELOCITY);
        self.track(|notes| {
            notes.note_on(pitch, velocity);
        })
    }

    /// Release a key. While latched the note keeps sounding.
    pub fn note_off(&mut self, pitch: u8) -> Option<Transition> {
        if pitch > arpy_types::MAX_PITCH {
            log::warn!(target: "arpy::instance", "instance {}: ignoring note-off for invalid pitch {}", self.id, pitch);
            return None;
        }
        self.track(|notes| {
            notes.note_off(pitch);
        })
    }

    /// Drop every held note, latched or not.
    pub fn clear(&mut self) -> Option<Transition> {
        self.track(NoteSet::clear)
    }

    /// Enabling latch sustains whatever is held now; disabling it makes the
    /// sustained set live again, so the next note-off takes effect.
    pub fn set_latch(&mut self, enabled: bool) -> Option<Transition> {
        self.track(|notes| notes.set_latched(enabled))
    }

    pub fn is_latched(&self) -> bool {
        self.notes.is_latched()
    }

    fn track(&mut self, change: impl FnOnce(&mut NoteSet)) -> Option<Transition> {
        let from = self.state();
        change(&mut self.notes);
        let to = self.state();
        (from != to).then_some(Transition { id: self.id, from, to })
    }

    /// Copy of the held notes, as pattern generation sees them.
    pub fn snapshot(&self) -> Snapshot {
        self.notes.snapshot()
    }

    // ── Parameters ────────────────────────────────────────────────

    pub fn mode(&self) -> PatternMode {
        self.generator.mode()
    }

    /// Swap the pattern without resetting the cursor.
    pub fn set_mode(&mut self, mode: PatternMode) {
        self.generator.set_mode(mode);
    }

    pub fn bpm(&self) -> u16 {
        self.bpm
    }

    /// Out-of-range tempo is clamped to 20-999, never rejected. The clock
    /// picks the new value up at the next step boundary.
    pub fn set_tempo(&mut self, bpm: u32) {
        let clamped = bpm.clamp(MIN_BPM as u32, MAX_BPM as u32) as u16;
        if clamped as u32 != bpm {
            self.report(EngineError::clamped("tempo", bpm, clamped));
        }
        self.bpm = clamped;
    }

    pub fn root_offset(&self) -> i8 {
        self.root_offset
    }

    pub fn set_root_offset(&mut self, semitones: i32) {
        let clamped = semitones.clamp(MIN_ROOT_OFFSET as i32, MAX_ROOT_OFFSET as i32) as i8;
        if clamped as i32 != semitones {
            self.report(EngineError::clamped("root offset", semitones, clamped));
        }
        self.root_offset = clamped;
    }

    pub fn rate(&self) -> StepRate {
        self.rate
    }

    pub fn set_rate(&mut self, rate: StepRate) {
        self.rate = rate;
    }

    pub fn gate(&self) -> f32 {
        self.gate
    }

    pub fn set_gate(&mut self, gate: f32) {
        let clamped = if gate.is_nan() { MAX_GATE } else { gate.clamp(MIN_GATE, MAX_GATE) };
        if clamped != gate {
            self.report(EngineError::clamped("gate", gate, clamped));
        }
        self.gate = clamped;
    }

    pub fn octave_spread(&self) -> u8 {
        self.generator.octave_spread()
    }

    pub fn set_octave_spread(&mut self, octaves: u8) {
        let clamped = octaves.clamp(MIN_OCTAVE_SPREAD, MAX_OCTAVE_SPREAD);
        if clamped != octaves {
            self.report(EngineError::clamped("octave spread", octaves, clamped));
        }
        self.generator.set_octave_spread(clamped);
    }

    fn report(&self, err: EngineError) {
        log::debug!(target: "arpy::instance", "instance {}: {}", self.id, err);
    }

    /// Parameters as a preset. Routing lives elsewhere, so `route` is `None`.
    pub fn preset(&self) -> InstancePreset {
        InstancePreset {
            mode: self.mode(),
            bpm: self.bpm,
            root_offset: self.root_offset,
            rate: self.rate,
            gate: self.gate,
            octave_spread: self.octave_spread(),
            latch: self.is_latched(),
            route: None,
        }
    }

    /// Apply every parameter of `preset` (routing excluded). Held notes and
    /// the cursor are kept.
    pub fn apply_preset(&mut self, preset: &InstancePreset) -> Option<Transition> {
        self.set_mode(preset.mode);
        self.set_tempo(preset.bpm as u32);
        self.set_root_offset(preset.root_offset as i32);
        self.set_rate(preset.rate);
        self.set_gate(preset.gate);
        self.set_octave_spread(preset.octave_spread);
        self.set_latch(preset.latch)
    }

    // ── Stepping ──────────────────────────────────────────────────

    /// Length of one step at the current tempo and subdivision.
    pub fn step_interval(&self) -> Duration {
        step_interval(self.bpm, self.rate)
    }

    /// How long a note sounds within a step of length `interval`.
    pub fn gate_length(&self, interval: Duration) -> Duration {
        let permille = (self.gate * 1000.0).round() as u32;
        interval * permille / 1000
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Advance the pattern by one step and return the notes to play, with
    /// root offset applied and pitches clamped into MIDI range. A pitch that
    /// lands on one already in the step (several notes clamped to 127) is
    /// played once.
    ///
    /// An empty note set yields `EmptyPatternInput` and leaves the cursor
    /// untouched. A duplicate pitch is a defect: debug builds panic, release
    /// builds repair the set and restart the pattern from the top.
    pub fn next_step(&mut self) -> Result<Vec<Note>, EngineError> {
        let snapshot = self.notes.snapshot();
        match self.generator.next(&snapshot.pitches(), self.cursor) {
            Ok(step) => {
                self.cursor = step.cursor;
                let mut notes: Vec<Note> = Vec::with_capacity(step.voices.len());
                for voice in &step.voices {
                    let velocity = snapshot.velocity_of(voice.source).unwrap_or(100).max(1);
                    let note = Note::new(voice.pitch as i32 + self.root_offset as i32, velocity as i32);
                    if notes.iter().any(|n| n.pitch == note.pitch) {
                        log::trace!(target: "arpy::instance", "instance {}: pitch {} already in step", self.id, note.pitch);
                        continue;
                    }
                    notes.push(note);
                }
                Ok(notes)
            }
            Err(PatternError::EmptyInput) => Err(EngineError::EmptyPatternInput(self.id)),
            Err(PatternError::DuplicatePitch(pitch)) => {
                if cfg!(debug_assertions) {
                    panic!("instance {}: duplicate pitch {} in note set", self.id, pitch);
                }
                log::error!(target: "arpy::instance", "instance {}: duplicate pitch {}, resetting pattern", self.id, pitch);
                self.notes.dedup();
                self.cursor = 0;
                Err(EngineError::InvariantViolation {
                    instance: self.id,
                    detail: format!("duplicate pitch {}", pitch),
                })
            }
        }
    }
}

/// Step length for `bpm` at subdivision `rate`: 60000 / bpm ms per beat.
pub fn step_interval(bpm: u16, rate: StepRate) -> Duration {
    let bpm = bpm.clamp(MIN_BPM, MAX_BPM) as u64;
    let nanos_per_beat = 60_000_000_000u64 / bpm;
    Duration::from_nanos(nanos_per_beat / rate.steps_per_beat() as u64)
}
