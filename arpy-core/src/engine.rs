//! The arpeggiation engine: a pool of instances driven by one clock.
//!
//! `Engine` is single-threaded and runs on logical time (a `Duration` since
//! start supplied by the caller), which keeps it deterministic under test.
//! [`crate::handle::EngineHandle`] wraps it in a thread fed by wall-clock time.
//!
//! `apply` first brings the clock up to just before `now`, so a held-note
//! change never affects a step that was already due, while notes arriving at
//! the same instant as a step still join it.

use std::sync::Arc;
use std::time::Duration;

use arpy_types::{
    DeviceId, EngineCommand, InstanceId, InstancePreset, Note, PatternMode, PresetBank, Route,
    StepRate, Target,
};

use crate::clock::{Clock, TickReport, DEFAULT_STRUM_SPACING};
use crate::error::{EngineError, EngineResult};
use crate::instance::{ArpeggiatorInstance, Transition};
use crate::pool::InstancePool;
use crate::routing::{RoutingTable, SharedRouting};
use crate::sink::NoteSink;
use crate::telemetry::{ClockTelemetry, TelemetrySummary};

/// Everything needed to build an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub pool_size: usize,
    /// Parameters every instance starts with. `route` becomes the fallback.
    pub defaults: InstancePreset,
    pub strum_spacing: Duration,
    pub seed: u64,
    /// How often the engine thread ticks the clock.
    pub tick_interval: Duration,
    /// How often the engine thread logs a telemetry summary.
    pub telemetry_interval: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            pool_size: 1,
            defaults: InstancePreset::default(),
            strum_spacing: DEFAULT_STRUM_SPACING,
            seed: 0,
            tick_interval: Duration::from_millis(1),
            telemetry_interval: Duration::from_secs(10),
        }
    }
}

pub struct Engine {
    pool: InstancePool,
    clock: Clock,
    routing: SharedRouting,
    telemetry: ClockTelemetry,
    now: Duration,
}

impl Engine {
    pub fn new(settings: &EngineSettings) -> EngineResult<Self> {
        let mut defaults = settings.defaults.clone();
        let fallback = defaults.route.take().unwrap_or_default();
        let pool = InstancePool::new(settings.pool_size, &defaults, settings.seed)?;
        log::info!(
            target: "arpy::engine",
            "engine ready: {} instance(s), fallback channel {} device {}",
            pool.len(),
            fallback.channel,
            fallback.device
        );
        Ok(Self {
            clock: Clock::new(pool.len(), settings.strum_spacing),
            pool,
            routing: Arc::new(RoutingTable::new(fallback)),
            telemetry: ClockTelemetry::new(),
            now: Duration::ZERO,
        })
    }

    pub fn pool(&self) -> &InstancePool {
        &self.pool
    }

    pub fn instance(&self, id: InstanceId) -> Option<&ArpeggiatorInstance> {
        self.pool.get(id)
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// The routing table currently published. Cheap to clone and hold.
    pub fn routing(&self) -> SharedRouting {
        Arc::clone(&self.routing)
    }

    /// Latest logical time the engine has seen.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn telemetry_mut(&mut self) -> &mut ClockTelemetry {
        &mut self.telemetry
    }

    pub fn take_telemetry_summary(&mut self) -> TelemetrySummary {
        self.telemetry.take_summary()
    }

    // ── Time ──────────────────────────────────────────────────────

    /// Emit everything due up to `now`.
    pub fn tick(&mut self, now: Duration, sink: &mut dyn NoteSink) -> TickReport {
        let now = self.advance(now);
        let report = self.clock.tick(now, &mut self.pool, &self.routing, sink);
        self.telemetry.record_report(&report);
        report
    }

    fn advance(&mut self, now: Duration) -> Duration {
        if now < self.now {
            log::trace!(target: "arpy::engine", "time went backwards ({:?} < {:?})", now, self.now);
        } else {
            self.now = now;
        }
        self.now
    }

    /// Apply one command at `now`.
    pub fn apply(&mut self, cmd: EngineCommand, now: Duration, sink: &mut dyn NoteSink) {
        if let Some(before) = now.checked_sub(Duration::from_nanos(1)) {
            self.tick(before, sink);
        }
        self.advance(now);
        match cmd {
            EngineCommand::NoteOn { pitch, velocity, target } => self.note_on(pitch, velocity, &target),
            EngineCommand::NoteOff { pitch, target } => self.note_off(pitch, &target),
            EngineCommand::Clear { target } => self.clear(&target),
            EngineCommand::Stop { target } => self.stop(&target, sink),
            EngineCommand::SetMode { instance, mode } => self.set_mode(instance, mode),
            EngineCommand::SetTempo { instance, bpm } => self.set_tempo(instance, bpm),
            EngineCommand::SetRootOffset { instance, semitones } => {
                self.set_root_offset(instance, semitones)
            }
            EngineCommand::SetLatch { instance, enabled } => self.set_latch(instance, enabled),
            EngineCommand::SetRouting { instance, channel, device } => {
                self.set_routing(instance, channel, device)
            }
            EngineCommand::SetRate { instance, rate } => self.set_rate(instance, rate),
            EngineCommand::SetGate { instance, gate } => self.set_gate(instance, gate),
            EngineCommand::SetOctaveSpread { instance, octaves } => {
                self.set_octave_spread(instance, octaves)
            }
            EngineCommand::ApplyPreset { instance, preset } => self.apply_preset(instance, &preset),
        }
    }

    // ── Held notes ────────────────────────────────────────────────
    //
    // These act at the engine's current time. Call `tick(now)` first (or go
    // through `apply`) when driving the engine by hand.

    pub fn note_on(&mut self, pitch: u8, velocity: u8, target: &Target) {
        let transitions = self.pool.note_on(pitch, velocity, target);
        self.on_transitions(transitions);
    }

    pub fn note_off(&mut self, pitch: u8, target: &Target) {
        let transitions = self.pool.note_off(pitch, target);
        self.on_transitions(transitions);
    }

    /// Feed a controller note. Control-change messages are not notes and are
    /// ignored.
    pub fn input(&mut self, note: Note, is_note_off: bool, target: &Target) {
        if note.is_control_change {
            log::trace!(target: "arpy::engine", "ignoring control change {}", note.pitch);
        } else if is_note_off {
            self.note_off(note.pitch, target);
        } else {
            self.note_on(note.pitch, note.velocity, target);
        }
    }

    /// Drop held notes (latched ones too). Notes already sounding finish
    /// their gate.
    pub fn clear(&mut self, target: &Target) {
        let transitions = self.pool.clear(target);
        self.on_transitions(transitions);
    }

    /// Silence targeted instances now: pending note-offs are emitted at the
    /// current time and held notes are dropped.
    pub fn stop(&mut self, target: &Target, sink: &mut dyn NoteSink) {
        let now = self.now;
        let clock = &mut self.clock;
        self.pool.for_each_target(target, |instance| {
            let released = clock.flush(instance.id(), now, sink);
            if released > 0 {
                log::debug!(target: "arpy::engine", "instance {}: stop released {} note(s)", instance.id(), released);
            }
            instance.clear()
        });
    }

    /// Stop every instance.
    pub fn panic(&mut self, sink: &mut dyn NoteSink) {
        self.stop(&Target::All, sink);
    }

    fn on_transitions(&mut self, transitions: Vec<Transition>) {
        for t in transitions {
            if t.started() {
                self.clock.arm(t.id, self.now);
            } else if t.stopped() {
                self.clock.disarm(t.id);
            }
            log::trace!(target: "arpy::engine", "instance {}: {:?} -> {:?}", t.id, t.from, t.to);
        }
    }

    // ── Parameters ────────────────────────────────────────────────

    fn with_instance<R>(
        &mut self,
        id: InstanceId,
        f: impl FnOnce(&mut ArpeggiatorInstance) -> R,
    ) -> Option<R> {
        match self.pool.get_mut(id) {
            Some(instance) => Some(f(instance)),
            None => {
                log::warn!(target: "arpy::engine", "{}", EngineError::UnknownInstance(id));
                None
            }
        }
    }

    pub fn set_mode(&mut self, id: InstanceId, mode: PatternMode) {
        self.with_instance(id, |i| i.set_mode(mode));
    }

    pub fn set_tempo(&mut self, id: InstanceId, bpm: u32) {
        self.with_instance(id, |i| i.set_tempo(bpm));
    }

    pub fn set_root_offset(&mut self, id: InstanceId, semitones: i32) {
        self.with_instance(id, |i| i.set_root_offset(semitones));
    }

    pub fn set_latch(&mut self, id: InstanceId, enabled: bool) {
        if let Some(transition) = self.with_instance(id, |i| i.set_latch(enabled)).flatten() {
            self.on_transitions(vec![transition]);
        }
    }

    pub fn set_rate(&mut self, id: InstanceId, rate: StepRate) {
        self.with_instance(id, |i| i.set_rate(rate));
    }

    pub fn set_gate(&mut self, id: InstanceId, gate: f32) {
        self.with_instance(id, |i| i.set_gate(gate));
    }

    pub fn set_octave_spread(&mut self, id: InstanceId, octaves: u8) {
        self.with_instance(id, |i| i.set_octave_spread(octaves));
    }

    /// Publish a new routing table with `id` sent to `channel` on `device`.
    /// Notes already sounding keep the route they started with.
    pub fn set_routing(&mut self, id: InstanceId, channel: u8, device: DeviceId) {
        if !self.pool.contains(id) {
            log::warn!(target: "arpy::engine", "{}", EngineError::UnknownInstance(id));
            return;
        }
        self.routing = Arc::new(self.routing.with_route(id, channel, device));
    }

    // ── Presets ───────────────────────────────────────────────────

    /// Current parameters of every instance, with explicit routes included.
    pub fn presets(&self) -> PresetBank {
        let mut bank = PresetBank::new();
        for instance in self.pool.iter() {
            let mut preset = instance.preset();
            preset.route = self.routing.get(instance.id());
            bank.insert(instance.id(), preset);
        }
        bank
    }

    pub fn apply_preset(&mut self, id: InstanceId, preset: &InstancePreset) {
        if let Some(transition) = self.with_instance(id, |i| i.apply_preset(preset)).flatten() {
            self.on_transitions(vec![transition]);
        }
        if let Some(Route { channel, device }) = preset.route {
            self.set_routing(id, channel, device);
        }
    }

    /// Apply every preset in `bank`. Entries for instances outside the pool
    /// are logged and skipped.
    pub fn apply_bank(&mut self, bank: &PresetBank) {
        for (id, preset) in bank.iter() {
            self.apply_preset(id, preset);
        }
    }
}
