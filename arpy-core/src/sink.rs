//! The engine's only output channel.
//!
//! Collaborators (sound generators, visualisers, MIDI ports) implement
//! [`NoteSink`]; the engine calls it for every note event in time order and
//! never loads or looks up anything itself.

use arpy_types::ScheduledEvent;
use crossbeam_channel::Sender;

pub trait NoteSink {
    fn on_note_event(&mut self, event: &ScheduledEvent);
}

/// Collects events in memory. Handy for tests and offline rendering.
impl NoteSink for Vec<ScheduledEvent> {
    fn on_note_event(&mut self, event: &ScheduledEvent) {
        self.push(*event);
    }
}

/// Forwards events to another thread (e.g. a visualiser).
impl NoteSink for Sender<ScheduledEvent> {
    fn on_note_event(&mut self, event: &ScheduledEvent) {
        if let Err(e) = self.send(*event) {
            log::trace!(target: "arpy::sink", "note event dropped, receiver gone: {}", e);
        }
    }
}

impl<S: NoteSink + ?Sized> NoteSink for Box<S> {
    fn on_note_event(&mut self, event: &ScheduledEvent) {
        (**self).on_note_event(event);
    }
}

/// Fans every event out to several sinks, in order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn NoteSink + Send>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: Box<dyn NoteSink + Send>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl NoteSink for FanoutSink {
    fn on_note_event(&mut self, event: &ScheduledEvent) {
        for sink in &mut self.sinks {
            sink.on_note_event(event);
        }
    }
}
