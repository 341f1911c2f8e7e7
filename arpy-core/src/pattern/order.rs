//! Deterministic step orders.
//!
//! Each function maps pitches sorted ascending (no duplicates, non-empty) to
//! the full cycle of one pattern. The cursor indexes into that cycle.

use arpy_types::PatternMode;

/// Index of the sorted pitch emitted at `position` of a converge cycle:
/// outer extremes first, narrowing inward.
fn converge_index(position: usize, n: usize, from_low: bool) -> usize {
    let pair = position / 2;
    let first = position % 2 == 0;
    if first == from_low {
        pair
    } else {
        n - 1 - pair
    }
}

/// Full cycle for the deterministic modes. Random and Flow have no fixed
/// order and fall back to ascending.
pub fn cycle(mode: PatternMode, sorted: &[u8], octaves: u8) -> Vec<u8> {
    let n = sorted.len();
    match mode {
        PatternMode::Up | PatternMode::Random | PatternMode::Flow => sorted.to_vec(),
        PatternMode::Down => sorted.iter().rev().copied().collect(),
        PatternMode::UpDown => pendulum(sorted),
        PatternMode::DownUp => {
            let reversed: Vec<u8> = sorted.iter().rev().copied().collect();
            pendulum(&reversed)
        }
        PatternMode::ConvergeUp => (0..n).map(|i| sorted[converge_index(i, n, true)]).collect(),
        PatternMode::ConvergeDown => (0..n).map(|i| sorted[converge_index(i, n, false)]).collect(),
        // Expanding is converging played backwards: start in the middle, end
        // on the extreme the name points at.
        PatternMode::ExpandUp => {
            let mut order = cycle(PatternMode::ConvergeDown, sorted, octaves);
            order.reverse();
            order
        }
        PatternMode::ExpandDown => {
            let mut order = cycle(PatternMode::ConvergeUp, sorted, octaves);
            order.reverse();
            order
        }
        PatternMode::LowAlternateUp => {
            alternate(sorted[0], sorted[1..].iter().copied())
        }
        PatternMode::LowAlternateDown => {
            alternate(sorted[0], sorted[1..].iter().rev().copied())
        }
        PatternMode::HighAlternateUp => {
            alternate(sorted[n - 1], sorted[..n - 1].iter().copied())
        }
        PatternMode::HighAlternateDown => {
            alternate(sorted[n - 1], sorted[..n - 1].iter().rev().copied())
        }
        PatternMode::ChordStrum => sorted.to_vec(),
        PatternMode::OctaveSpread => octave_lanes(sorted, octaves),
    }
}

/// Number of steps in one cycle. ChordStrum plays the whole chord in one step.
pub fn cycle_len(mode: PatternMode, sorted: &[u8], octaves: u8) -> usize {
    let n = sorted.len();
    match mode {
        PatternMode::ChordStrum => 1,
        PatternMode::UpDown | PatternMode::DownUp if n > 1 => 2 * n - 2,
        PatternMode::LowAlternateUp
        | PatternMode::LowAlternateDown
        | PatternMode::HighAlternateUp
        | PatternMode::HighAlternateDown
            if n > 1 =>
        {
            2 * (n - 1)
        }
        PatternMode::OctaveSpread => octave_lanes(sorted, octaves).len(),
        _ => n,
    }
}

/// There and back without repeating either extreme: 0 1 2 3 2 1.
fn pendulum(ordered: &[u8]) -> Vec<u8> {
    let n = ordered.len();
    if n <= 1 {
        return ordered.to_vec();
    }
    let mut out = ordered.to_vec();
    out.extend(ordered[1..n - 1].iter().rev());
    out
}

/// Anchor on every other step, the traversal in between.
fn alternate(anchor: u8, rest: impl Iterator<Item = u8>) -> Vec<u8> {
    let mut out = Vec::new();
    for pitch in rest {
        out.push(anchor);
        out.push(pitch);
    }
    if out.is_empty() {
        out.push(anchor);
    }
    out
}

/// The ascending traversal repeated one lane per octave. Copies above 127
/// are skipped; the base lane always survives.
pub fn octave_lanes(sorted: &[u8], octaves: u8) -> Vec<u8> {
    octave_voices(sorted, octaves).into_iter().map(|(_, pitch)| pitch).collect()
}

/// Like [`octave_lanes`], paired with the held pitch each entry derives from.
pub fn octave_voices(sorted: &[u8], octaves: u8) -> Vec<(u8, u8)> {
    let mut out = Vec::with_capacity(sorted.len() * octaves.max(1) as usize);
    for lane in 0..octaves.max(1) as u16 {
        for &pitch in sorted {
            let shifted = pitch as u16 + lane * 12;
            if shifted <= 127 {
                out.push((pitch, shifted as u8));
            }
        }
    }
    out
}
