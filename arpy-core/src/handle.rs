//! Threaded runtime around [`Engine`].
//!
//! A dedicated engine thread owns the engine and the output sink. Callers
//! talk to it through [`EngineHandle`] over two crossbeam channels. Every
//! engine command and query shares the normal channel, so the engine applies
//! them in the order they were sent (a latch sent before a note-off is in
//! place when the note-off lands). The priority channel carries only panic
//! and shutdown. The thread ticks the clock every `tick_interval` using
//! wall-clock time since spawn, and flushes every pending note-off when it
//! shuts down.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use arpy_types::{
    DeviceId, EngineCommand, InstanceId, InstancePreset, PatternMode, PresetBank, StepRate, Target,
};
use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::engine::{Engine, EngineSettings};
use crate::error::{EngineError, EngineResult};
use crate::routing::SharedRouting;
use crate::sink::NoteSink;
use crate::telemetry::TelemetrySummary;

pub(crate) enum ThreadCmd {
    Engine(EngineCommand),
    Presets { reply: Sender<PresetBank> },
    Routing { reply: Sender<SharedRouting> },
    Telemetry { reply: Sender<TelemetrySummary> },
    Panic,
    Shutdown,
}

impl ThreadCmd {
    /// Only panic and shutdown may overtake queued commands.
    fn is_priority(&self) -> bool {
        matches!(self, ThreadCmd::Panic | ThreadCmd::Shutdown)
    }
}

/// Cloneable sending half of an [`EngineHandle`]. Safe to move into other
/// threads, e.g. a MIDI input callback.
#[derive(Clone)]
pub struct CommandSender {
    /// Panic and shutdown
    priority_tx: Sender<ThreadCmd>,
    /// Engine commands and queries, in send order
    normal_tx: Sender<ThreadCmd>,
}

impl CommandSender {
    fn send_cmd(&self, cmd: ThreadCmd) -> EngineResult {
        let tx = if cmd.is_priority() { &self.priority_tx } else { &self.normal_tx };
        tx.send(cmd)
            .map_err(|_| EngineError::Disconnected("engine thread disconnected".to_string()))
    }

    /// Fire-and-forget: send and log if the engine thread is gone.
    fn send(&self, cmd: ThreadCmd) {
        if let Err(e) = self.send_cmd(cmd) {
            log::warn!(target: "arpy::handle", "command dropped: {}", e);
        }
    }

    pub fn command(&self, cmd: EngineCommand) {
        self.send(ThreadCmd::Engine(cmd));
    }
}

/// Caller-side handle to the engine thread.
pub struct EngineHandle {
    sender: CommandSender,
    pool_size: usize,
    join_handle: Option<JoinHandle<()>>,
}

impl EngineHandle {
    /// Build the engine and start its thread. Fails on an invalid pool size
    /// or if the thread cannot be spawned.
    pub fn spawn(settings: EngineSettings, sink: Box<dyn NoteSink + Send>) -> EngineResult<Self> {
        let engine = Engine::new(&settings)?;
        let pool_size = engine.pool().len();
        let (priority_tx, priority_rx) = crossbeam_channel::unbounded();
        let (normal_tx, normal_rx) = crossbeam_channel::unbounded();

        let join_handle = thread::Builder::new()
            .name("arpy-engine".into())
            .spawn(move || {
                EngineThread::new(engine, sink, priority_rx, normal_rx, &settings).run();
            })
            .map_err(|e| EngineError::Disconnected(format!("failed to spawn engine thread: {}", e)))?;

        Ok(Self {
            sender: CommandSender { priority_tx, normal_tx },
            pool_size,
            join_handle: Some(join_handle),
        })
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// A cloneable sender for feeding commands from other threads.
    pub fn sender(&self) -> CommandSender {
        self.sender.clone()
    }

    fn send(&self, cmd: ThreadCmd) {
        self.sender.send(cmd);
    }

    fn request<T>(&self, make: impl FnOnce(Sender<T>) -> ThreadCmd) -> EngineResult<T> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.sender.send_cmd(make(reply_tx))?;
        reply_rx
            .recv()
            .map_err(|_| EngineError::Disconnected("engine thread dropped the reply".to_string()))
    }

    pub fn command(&self, cmd: EngineCommand) {
        self.sender.command(cmd);
    }

    pub fn note_on(&self, pitch: u8, velocity: u8, target: Target) {
        self.command(EngineCommand::NoteOn { pitch, velocity, target });
    }

    pub fn note_off(&self, pitch: u8, target: Target) {
        self.command(EngineCommand::NoteOff { pitch, target });
    }

    pub fn clear(&self, target: Target) {
        self.command(EngineCommand::Clear { target });
    }

    pub fn stop(&self, target: Target) {
        self.command(EngineCommand::Stop { target });
    }

    /// Stop every instance now.
    pub fn panic(&self) {
        self.send(ThreadCmd::Panic);
    }

    pub fn set_mode(&self, instance: InstanceId, mode: PatternMode) {
        self.command(EngineCommand::SetMode { instance, mode });
    }

    pub fn set_tempo(&self, instance: InstanceId, bpm: u32) {
        self.command(EngineCommand::SetTempo { instance, bpm });
    }

    pub fn set_root_offset(&self, instance: InstanceId, semitones: i32) {
        self.command(EngineCommand::SetRootOffset { instance, semitones });
    }

    pub fn set_latch(&self, instance: InstanceId, enabled: bool) {
        self.command(EngineCommand::SetLatch { instance, enabled });
    }

    pub fn set_routing(&self, instance: InstanceId, channel: u8, device: DeviceId) {
        self.command(EngineCommand::SetRouting { instance, channel, device });
    }

    pub fn set_rate(&self, instance: InstanceId, rate: StepRate) {
        self.command(EngineCommand::SetRate { instance, rate });
    }

    pub fn set_gate(&self, instance: InstanceId, gate: f32) {
        self.command(EngineCommand::SetGate { instance, gate });
    }

    pub fn set_octave_spread(&self, instance: InstanceId, octaves: u8) {
        self.command(EngineCommand::SetOctaveSpread { instance, octaves });
    }

    pub fn apply_preset(&self, instance: InstanceId, preset: InstancePreset) {
        self.command(EngineCommand::ApplyPreset { instance, preset });
    }

    pub fn apply_bank(&self, bank: &PresetBank) {
        for (instance, preset) in bank.iter() {
            self.apply_preset(instance, preset.clone());
        }
    }

    /// Current parameters of every instance. Blocks until the engine replies.
    pub fn presets(&self) -> EngineResult<PresetBank> {
        self.request(|reply| ThreadCmd::Presets { reply })
    }

    pub fn routing(&self) -> EngineResult<SharedRouting> {
        self.request(|reply| ThreadCmd::Routing { reply })
    }

    pub fn telemetry(&self) -> EngineResult<TelemetrySummary> {
        self.request(|reply| ThreadCmd::Telemetry { reply })
    }

    /// Flush pending note-offs and stop the thread.
    pub fn shutdown(mut self) {
        self.stop_thread();
    }

    fn stop_thread(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            let _ = self.sender.send_cmd(ThreadCmd::Shutdown);
            if handle.join().is_err() {
                log::error!(target: "arpy::handle", "engine thread panicked");
            }
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.stop_thread();
    }
}

struct EngineThread {
    engine: Engine,
    sink: Box<dyn NoteSink + Send>,
    priority_rx: Receiver<ThreadCmd>,
    normal_rx: Receiver<ThreadCmd>,
    started: Instant,
    last_tick: Instant,
    tick_interval: Duration,
    telemetry_interval: Duration,
    last_telemetry_emit: Instant,
}

impl EngineThread {
    fn new(
        engine: Engine,
        sink: Box<dyn NoteSink + Send>,
        priority_rx: Receiver<ThreadCmd>,
        normal_rx: Receiver<ThreadCmd>,
        settings: &EngineSettings,
    ) -> Self {
        let now = Instant::now();
        Self {
            engine,
            sink,
            priority_rx,
            normal_rx,
            started: now,
            last_tick: now,
            tick_interval: settings.tick_interval.max(Duration::from_micros(100)),
            telemetry_interval: settings.telemetry_interval,
            last_telemetry_emit: now,
        }
    }

    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    fn run(mut self) {
        loop {
            let remaining = self.tick_interval.saturating_sub(self.last_tick.elapsed());

            // Priority channel first, then normal, else wait out the tick.
            let done = crossbeam_channel::select! {
                recv(self.priority_rx) -> result => match result {
                    Ok(cmd) => self.handle_cmd(cmd),
                    Err(_) => true,
                },
                recv(self.normal_rx) -> result => match result {
                    Ok(cmd) => self.handle_cmd(cmd),
                    Err(_) => true,
                },
                default(remaining) => false,
            };
            if done || self.drain_priority_commands() || self.drain_normal_commands() {
                break;
            }

            if self.last_tick.elapsed() >= self.tick_interval {
                self.last_tick = Instant::now();
                let tick_start = Instant::now();
                let now = self.now();
                self.engine.tick(now, &mut self.sink);
                let budget_us = self.tick_interval.as_micros() as u32;
                self.engine.telemetry_mut().record(tick_start.elapsed(), budget_us);
            }

            if self.last_telemetry_emit.elapsed() >= self.telemetry_interval {
                self.last_telemetry_emit = Instant::now();
                let s = self.engine.take_telemetry_summary();
                log::debug!(
                    target: "arpy::telemetry",
                    "tick avg {}us max {}us p95 {}us, overruns {}, dropped steps {}, events {}",
                    s.avg_tick_us,
                    s.max_tick_us,
                    s.p95_tick_us,
                    s.overruns,
                    s.dropped_steps,
                    s.events
                );
            }
        }

        let now = self.now();
        self.engine.tick(now, &mut self.sink);
        self.engine.panic(&mut self.sink);
        log::info!(target: "arpy::handle", "engine thread stopped");
    }

    /// Drain queued priority commands, bounded by time and count.
    fn drain_priority_commands(&mut self) -> bool {
        const MAX_DURATION: Duration = Duration::from_micros(200);
        const MAX_COUNT: usize = 128;
        let start = Instant::now();
        for _ in 0..MAX_COUNT {
            if start.elapsed() >= MAX_DURATION {
                break;
            }
            match self.priority_rx.try_recv() {
                Ok(cmd) => {
                    if self.handle_cmd(cmd) {
                        return true;
                    }
                }
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => return true,
            }
        }
        false
    }

    fn drain_normal_commands(&mut self) -> bool {
        const MAX_DURATION: Duration = Duration::from_micros(100);
        const MAX_COUNT: usize = 64;
        let start = Instant::now();
        for _ in 0..MAX_COUNT {
            if start.elapsed() >= MAX_DURATION {
                break;
            }
            match self.normal_rx.try_recv() {
                Ok(cmd) => {
                    if self.handle_cmd(cmd) {
                        return true;
                    }
                }
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => return true,
            }
        }
        false
    }

    /// Returns true when the thread should exit.
    fn handle_cmd(&mut self, cmd: ThreadCmd) -> bool {
        let now = self.now();
        match cmd {
            ThreadCmd::Engine(cmd) => self.engine.apply(cmd, now, &mut self.sink),
            ThreadCmd::Presets { reply } => {
                let _ = reply.send(self.engine.presets());
            }
            ThreadCmd::Routing { reply } => {
                let _ = reply.send(self.engine.routing());
            }
            ThreadCmd::Telemetry { reply } => {
                let _ = reply.send(self.engine.take_telemetry_summary());
            }
            ThreadCmd::Panic => {
                self.engine.tick(now, &mut self.sink);
                self.engine.panic(&mut self.sink);
            }
            ThreadCmd::Shutdown => return true,
        }
        false
    }
}
