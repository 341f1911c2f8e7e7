//! Single time source for every instance in a pool.
//!
//! The clock keeps, per instance, the time of the next step boundary and a
//! small queue of pending note-ons (strum bursts) and note-offs. `tick(now)`
//! processes everything due up to `now` in global time order; ties go to the
//! lowest instance id, and within one instance note-offs precede the step and
//! the step precedes its note-ons.
//!
//! Timing rules:
//! - Step length is read from the instance when a step fires, so a tempo
//!   change lands on the next boundary and never moves a note-off already
//!   scheduled.
//! - Each note-on's note-off is captured (pitch, route, time) when the step
//!   fires. Held-note changes afterwards cannot orphan it.
//! - If a whole step interval or more has passed since a boundary was due, the
//!   missed steps are dropped and only the latest boundary plays.
//! - An idle instance never steps and its cursor stays frozen.

use std::time::Duration;

use arpy_types::{InstanceId, Note, Route, ScheduledEvent};

use crate::error::EngineError;
use crate::pool::InstancePool;
use crate::routing::RoutingTable;
use crate::sink::NoteSink;

/// Default gap between notes of a strummed chord.
pub const DEFAULT_STRUM_SPACING: Duration = Duration::from_millis(8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingKind {
    On { off_at: Duration },
    Off,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    due: Duration,
    kind: PendingKind,
    note: Note,
    route: Route,
}

impl Pending {
    fn rank(&self) -> u8 {
        match self.kind {
            PendingKind::Off => 0,
            PendingKind::On { .. } => 2,
        }
    }
}

const STEP_RANK: u8 = 1;

#[derive(Debug, Clone, Default)]
struct VoiceClock {
    next_step: Option<Duration>,
    pending: Vec<Pending>,
}

#[derive(Debug, Clone, Copy)]
enum Due {
    Step,
    Pending(usize),
}

/// What one call to [`Clock::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub note_ons: usize,
    pub note_offs: usize,
    pub steps: usize,
    /// Steps skipped because the instance had nothing to play.
    pub skipped: usize,
    /// Steps dropped because the tick arrived too late.
    pub dropped: u64,
}

#[derive(Debug, Clone)]
pub struct Clock {
    voices: Vec<VoiceClock>,
    strum_spacing: Duration,
}

impl Clock {
    pub fn new(size: usize, strum_spacing: Duration) -> Self {
        Self {
            voices: vec![VoiceClock::default(); size],
            strum_spacing,
        }
    }

    pub fn strum_spacing(&self) -> Duration {
        self.strum_spacing
    }

    /// Start stepping `id` at `now` unless it is already stepping.
    pub fn arm(&mut self, id: InstanceId, now: Duration) {
        if let Some(voice) = self.voices.get_mut(id.index()) {
            if voice.next_step.is_none() {
                voice.next_step = Some(now);
            }
        }
    }

    /// Stop stepping `id`. Pending note-offs still fire on time.
    pub fn disarm(&mut self, id: InstanceId) {
        if let Some(voice) = self.voices.get_mut(id.index()) {
            voice.next_step = None;
        }
    }

    pub fn next_step_at(&self, id: InstanceId) -> Option<Duration> {
        self.voices.get(id.index()).and_then(|v| v.next_step)
    }

    /// Note-offs (and unstarted strum note-ons) still queued for `id`.
    pub fn pending_count(&self, id: InstanceId) -> usize {
        self.voices.get(id.index()).map_or(0, |v| v.pending.len())
    }

    /// Earliest time anything is due, across all instances.
    pub fn next_due(&self) -> Option<Duration> {
        self.voices
            .iter()
            .flat_map(|v| v.next_step.into_iter().chain(v.pending.iter().map(|p| p.due)))
            .min()
    }

    /// Stop `id` now: every pending note-off is emitted immediately with
    /// timestamp `now`, unstarted strum notes are discarded, stepping stops.
    pub fn flush(&mut self, id: InstanceId, now: Duration, sink: &mut dyn NoteSink) -> usize {
        let Some(voice) = self.voices.get_mut(id.index()) else {
            return 0;
        };
        voice.next_step = None;
        let mut pending = std::mem::take(&mut voice.pending);
        pending.sort_by_key(|p| p.due);
        let mut released = 0;
        for p in pending {
            if p.kind == PendingKind::Off {
                emit(sink, id, p.note, true, now, p.route);
                released += 1;
            }
        }
        released
    }

    /// Flush every instance.
    pub fn flush_all(&mut self, now: Duration, sink: &mut dyn NoteSink) -> usize {
        (0..self.voices.len())
            .map(|i| self.flush(InstanceId::new(i as u32), now, sink))
            .sum()
    }

    /// Process everything due at or before `now`, in time order.
    pub fn tick(
        &mut self,
        now: Duration,
        pool: &mut InstancePool,
        routing: &RoutingTable,
        sink: &mut dyn NoteSink,
    ) -> TickReport {
        let mut report = TickReport::default();

        while let Some((index, due)) = self.earliest_due(now) {
            let id = InstanceId::new(index as u32);
            match due {
                Due::Pending(slot) => {
                    let p = self.voices[index].pending.remove(slot);
                    match p.kind {
                        PendingKind::On { off_at } => {
                            emit(sink, id, p.note, false, p.due, p.route);
                            report.note_ons += 1;
                            self.voices[index].pending.push(Pending {
                                due: off_at,
                                kind: PendingKind::Off,
                                note: Note { velocity: 0, ..p.note },
                                route: p.route,
                            });
                        }
                        PendingKind::Off => {
                            emit(sink, id, p.note, true, p.due, p.route);
                            report.note_offs += 1;
                        }
                    }
                }
                Due::Step => {
                    let Some(instance) = pool.get_mut(id) else {
                        self.voices[index].next_step = None;
                        continue;
                    };
                    let voice = &mut self.voices[index];
                    let Some(mut at) = voice.next_step else {
                        continue;
                    };
                    if instance.is_idle() {
                        voice.next_step = None;
                        continue;
                    }

                    let interval = instance.step_interval();
                    let late = now.saturating_sub(at);
                    if late >= interval {
                        let missed = (late.as_nanos() / interval.as_nanos()) as u32;
                        at += interval * missed;
                        report.dropped += missed as u64;
                        log::debug!(target: "arpy::clock", "instance {}: dropped {} late step(s)", id, missed);
                    }
                    voice.next_step = Some(at + interval);

                    // Anything still queued would overlap the new step.
                    if !voice.pending.is_empty() {
                        let mut leftover = std::mem::take(&mut voice.pending);
                        leftover.sort_by_key(|p| p.due);
                        for p in leftover {
                            if p.kind == PendingKind::Off {
                                log::debug!(target: "arpy::clock", "instance {}: early release of {}", id, p.note.pitch);
                                emit(sink, id, p.note, true, at, p.route);
                                report.note_offs += 1;
                            }
                        }
                    }

                    match instance.next_step() {
                        Ok(notes) => {
                            report.steps += 1;
                            let route = routing.resolve(id);
                            let gate = instance.gate_length(interval);
                            let spacing = if notes.len() > 1 {
                                self.strum_spacing.min(gate / notes.len() as u32)
                            } else {
                                Duration::ZERO
                            };
                            for (k, note) in notes.into_iter().enumerate() {
                                voice.pending.push(Pending {
                                    due: at + spacing * k as u32,
                                    kind: PendingKind::On { off_at: at + gate },
                                    note,
                                    route,
                                });
                            }
                        }
                        Err(EngineError::EmptyPatternInput(_)) => {
                            report.skipped += 1;
                            log::trace!(target: "arpy::clock", "instance {}: nothing to play, step skipped", id);
                        }
                        Err(e) => {
                            report.skipped += 1;
                            log::warn!(target: "arpy::clock", "step skipped: {}", e);
                        }
                    }
                }
            }
        }

        report
    }

    /// The next item to process, ordered by (time, instance, kind).
    fn earliest_due(&self, now: Duration) -> Option<(usize, Due)> {
        let mut best: Option<((Duration, usize, u8), Due)> = None;
        let mut consider = |key: (Duration, usize, u8), due: Due| {
            if key.0 > now {
                return;
            }
            if best.as_ref().map_or(true, |(k, _)| key < *k) {
                best = Some((key, due));
            }
        };
        for (index, voice) in self.voices.iter().enumerate() {
            if let Some(at) = voice.next_step {
                consider((at, index, STEP_RANK), Due::Step);
            }
            for (slot, p) in voice.pending.iter().enumerate() {
                consider((p.due, index, p.rank()), Due::Pending(slot));
            }
        }
        best.map(|((_, index, _), due)| (index, due))
    }
}

fn emit(
    sink: &mut dyn NoteSink,
    source: InstanceId,
    note: Note,
    is_note_off: bool,
    timestamp: Duration,
    route: Route,
) {
    sink.on_note_event(&ScheduledEvent {
        source,
        note,
        is_note_off,
        timestamp,
        route,
    });
}
