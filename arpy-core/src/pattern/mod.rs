//! Pattern generation: held pitches + mode + cursor -> next note(s).
//!
//! Generation is pure given its inputs. The only state carried between calls
//! is the cursor (owned by the caller) and the seeded random source used by
//! `Random` and `Flow`.
//!
//! Cursor semantics: the cursor is the position in the current cycle of the
//! step about to play. After each step it advances modulo the cycle length.
//! When the held set shrinks (or the mode changes) and the cursor falls past
//! the end of the new cycle it is clamped to the last position instead of
//! being reset, so the rhythmic phase is disturbed as little as possible.
//!
//! `Flow` walks the sorted pitches like a random walk biased toward the
//! neighbours of the last note: from index `i` the next index is `i±1` with
//! probability 0.4 each and `i±2` with probability 0.1 each. A move that
//! would leave the range is mirrored; if the mirror also leaves it (two
//! notes held) the walk steps one place inward. It never repeats a note
//! while more than one is held.

pub mod order;

use arpy_types::PatternMode;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("no held notes")]
    EmptyInput,
    #[error("duplicate pitch {0} in snapshot")]
    DuplicatePitch(u8),
}

/// One note chosen by the generator, before root offset is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Voice {
    /// The held pitch this voice derives from (velocity lookup key).
    pub source: u8,
    /// Output pitch, including any octave transposition.
    pub pitch: u8,
}

impl Voice {
    fn plain(pitch: u8) -> Self {
        Self { source: pitch, pitch }
    }
}

/// Result of one generator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// One voice for every mode except ChordStrum, which yields the whole chord.
    pub voices: Vec<Voice>,
    pub cursor: usize,
}

impl Step {
    /// Pitch of the first voice.
    pub fn pitch(&self) -> u8 {
        self.voices[0].pitch
    }

    pub fn pitches(&self) -> Vec<u8> {
        self.voices.iter().map(|v| v.pitch).collect()
    }
}

/// Per-instance generator: mode, octave spread and a reproducible random source.
#[derive(Debug, Clone)]
pub struct PatternGenerator {
    mode: PatternMode,
    octave_spread: u8,
    rng: StdRng,
}

impl PatternGenerator {
    pub fn new(mode: PatternMode, octave_spread: u8, seed: u64) -> Self {
        Self {
            mode,
            octave_spread: octave_spread.clamp(1, 4),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn mode(&self) -> PatternMode {
        self.mode
    }

    /// Swap the mode. The caller keeps its cursor, so playback continues
    /// from the same phase.
    pub fn set_mode(&mut self, mode: PatternMode) {
        self.mode = mode;
    }

    pub fn octave_spread(&self) -> u8 {
        self.octave_spread
    }

    pub fn set_octave_spread(&mut self, octaves: u8) {
        self.octave_spread = octaves.clamp(1, 4);
    }

    /// Number of steps in the current cycle for `pitches`.
    pub fn cycle_len(&self, pitches: &[u8]) -> usize {
        let mut sorted = pitches.to_vec();
        sorted.sort_unstable();
        order::cycle_len(self.mode, &sorted, self.octave_spread)
    }

    /// Produce the next step for `pitches` (any order) at `cursor`.
    pub fn next(&mut self, pitches: &[u8], cursor: usize) -> Result<Step, PatternError> {
        let sorted = sorted_unique(pitches)?;
        let len = order::cycle_len(self.mode, &sorted, self.octave_spread);
        let position = if cursor >= len {
            log::trace!(target: "arpy::pattern", "cursor {} clamped into cycle of {}", cursor, len);
            len - 1
        } else {
            cursor
        };
        let next_cursor = (position + 1) % len;

        let step = match self.mode {
            PatternMode::ChordStrum => Step {
                voices: sorted.iter().map(|&p| Voice::plain(p)).collect(),
                cursor: 0,
            },
            PatternMode::Random => {
                let pick = self.rng.gen_range(0..sorted.len());
                Step {
                    voices: vec![Voice::plain(sorted[pick])],
                    cursor: next_cursor,
                }
            }
            PatternMode::Flow => Step {
                voices: vec![Voice::plain(sorted[position])],
                cursor: self.flow_step(position, sorted.len()),
            },
            PatternMode::OctaveSpread => {
                let (source, pitch) = order::octave_voices(&sorted, self.octave_spread)[position];
                Step {
                    voices: vec![Voice { source, pitch }],
                    cursor: next_cursor,
                }
            }
            mode => {
                let cycle = order::cycle(mode, &sorted, self.octave_spread);
                Step {
                    voices: vec![Voice::plain(cycle[position])],
                    cursor: next_cursor,
                }
            }
        };
        Ok(step)
    }

    fn flow_step(&mut self, from: usize, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        let roll = self.rng.gen_range(0..10);
        let delta: i64 = match roll {
            0 => -2,
            1..=4 => -1,
            5..=8 => 1,
            _ => 2,
        };
        let last = n as i64 - 1;
        let from = from as i64;
        let mut idx = from + delta;
        if idx < 0 || idx > last {
            idx = from - delta;
        }
        if idx < 0 || idx > last {
            idx = if from == 0 { 1 } else { from - 1 };
        }
        idx as usize
    }
}

fn sorted_unique(pitches: &[u8]) -> Result<Vec<u8>, PatternError> {
    if pitches.is_empty() {
        return Err(PatternError::EmptyInput);
    }
    let mut sorted = pitches.to_vec();
    sorted.sort_unstable();
    if let Some(pair) = sorted.windows(2).find(|w| w[0] == w[1]) {
        return Err(PatternError::DuplicatePitch(pair[0]));
    }
    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(gen: &mut PatternGenerator, pitches: &[u8], steps: usize) -> Vec<u8> {
        let mut cursor = 0;
        let mut out = Vec::new();
        for _ in 0..steps {
            let step = gen.next(pitches, cursor).unwrap();
            out.push(step.pitch());
            cursor = step.cursor;
        }
        out
    }

    #[test]
    fn up_cycles_over_sorted_pitches() {
        let mut gen = PatternGenerator::new(PatternMode::Up, 1, 1);
        assert_eq!(run(&mut gen, &[67, 60, 64], 7), vec![60, 64, 67, 60, 64, 67, 60]);
    }

    #[test]
    fn down_cycles_descending() {
        let mut gen = PatternGenerator::new(PatternMode::Down, 1, 1);
        assert_eq!(run(&mut gen, &[60, 64, 67], 6), vec![67, 64, 60, 67, 64, 60]);
    }

    #[test]
    fn empty_input_is_an_error() {
        let mut gen = PatternGenerator::new(PatternMode::Up, 1, 1);
        assert_eq!(gen.next(&[], 0), Err(PatternError::EmptyInput));
    }

    #[test]
    fn duplicate_pitch_is_reported() {
        let mut gen = PatternGenerator::new(PatternMode::Up, 1, 1);
        assert_eq!(gen.next(&[60, 64, 60], 0), Err(PatternError::DuplicatePitch(60)));
    }

    #[test]
    fn cursor_is_clamped_when_the_set_shrinks() {
        let mut gen = PatternGenerator::new(PatternMode::Up, 1, 1);
        // Cursor 3 was valid for four notes; with two left it clamps to the top.
        let step = gen.next(&[60, 64], 3).unwrap();
        assert_eq!(step.pitch(), 64);
        assert_eq!(step.cursor, 0);
    }

    #[test]
    fn mode_swap_keeps_phase() {
        let mut gen = PatternGenerator::new(PatternMode::Up, 1, 1);
        let first = gen.next(&[60, 64, 67], 0).unwrap();
        assert_eq!(first.pitch(), 60);
        gen.set_mode(PatternMode::Down);
        let second = gen.next(&[60, 64, 67], first.cursor).unwrap();
        // Position 1 of the descending cycle
        assert_eq!(second.pitch(), 64);
        assert_eq!(second.cursor, 2);
    }

    #[test]
    fn chord_strum_emits_the_whole_chord() {
        let mut gen = PatternGenerator::new(PatternMode::ChordStrum, 1, 1);
        let step = gen.next(&[60, 48, 64, 52, 67, 55], 0).unwrap();
        assert_eq!(step.pitches(), vec![48, 52, 55, 60, 64, 67]);
        assert_eq!(step.cursor, 0);
    }

    #[test]
    fn octave_spread_reports_source_pitch() {
        let mut gen = PatternGenerator::new(PatternMode::OctaveSpread, 2, 1);
        let step = gen.next(&[60, 64], 3).unwrap();
        assert_eq!(step.voices, vec![Voice { source: 64, pitch: 76 }]);
        assert_eq!(step.cursor, 0);
    }

    #[test]
    fn random_is_reproducible_with_the_same_seed() {
        let pitches = [48, 52, 55, 60, 64, 67, 72];
        let mut a = PatternGenerator::new(PatternMode::Random, 1, 42);
        let mut b = PatternGenerator::new(PatternMode::Random, 1, 42);
        let seq_a = run(&mut a, &pitches, 64);
        let seq_b = run(&mut b, &pitches, 64);
        assert_eq!(seq_a, seq_b);
        assert!(seq_a.iter().all(|p| pitches.contains(p)));
    }

    #[test]
    fn random_still_advances_the_cursor() {
        let mut gen = PatternGenerator::new(PatternMode::Random, 1, 7);
        let step = gen.next(&[60, 64, 67], 1).unwrap();
        assert_eq!(step.cursor, 2);
    }

    #[test]
    fn flow_moves_at_most_two_places() {
        let pitches = [48, 50, 52, 53, 55, 57, 59, 60];
        let mut gen = PatternGenerator::new(PatternMode::Flow, 1, 9);
        let mut cursor = 3;
        let mut last_index: Option<usize> = None;
        for _ in 0..200 {
            let step = gen.next(&pitches, cursor).unwrap();
            let index = pitches.iter().position(|&p| p == step.pitch()).unwrap();
            if let Some(prev) = last_index {
                let distance = (index as i64 - prev as i64).abs();
                assert!((1..=2).contains(&distance), "jumped {} places", distance);
            }
            last_index = Some(index);
            cursor = step.cursor;
        }
    }

    #[test]
    fn flow_with_one_note_stays_put() {
        let mut gen = PatternGenerator::new(PatternMode::Flow, 1, 3);
        assert_eq!(run(&mut gen, &[60], 5), vec![60; 5]);
    }

    #[test]
    fn every_mode_emits_held_pitches() {
        let pitches = [48, 55, 60, 64, 67];
        for mode in PatternMode::ALL {
            let mut gen = PatternGenerator::new(mode, 3, 5);
            let mut cursor = 0;
            for _ in 0..40 {
                let step = gen.next(&pitches, cursor).unwrap();
                for voice in &step.voices {
                    assert!(pitches.contains(&voice.source), "{:?} source {}", mode, voice.source);
                    assert_eq!((voice.pitch - voice.source) % 12, 0);
                    if mode != PatternMode::OctaveSpread {
                        assert_eq!(voice.pitch, voice.source);
                    }
                }
                cursor = step.cursor;
            }
        }
    }
}
