//! # arpy-core
//!
//! Real-time arpeggiation engine. A fixed pool of independent arpeggiator
//! instances turns held notes into rhythmic note sequences, all driven by a
//! single clock, and reports every note-on/note-off through a [`NoteSink`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use arpy_core::{Engine, EngineSettings};
//! use arpy_types::{EngineCommand, ScheduledEvent, Target};
//!
//! let mut engine = Engine::new(&EngineSettings::default())?;
//! let mut out: Vec<ScheduledEvent> = Vec::new();
//!
//! for pitch in [60, 64, 67] {
//!     let cmd = EngineCommand::NoteOn { pitch, velocity: 100, target: Target::All };
//!     engine.apply(cmd, Duration::ZERO, &mut out);
//! }
//! engine.tick(Duration::from_secs(2), &mut out); // 60, 64, 67, 60 at 120 BPM
//! ```
//!
//! For live use, [`EngineHandle::spawn`] runs the engine on its own thread and
//! ticks it from the wall clock.

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod handle;
pub mod instance;
pub mod note_set;
pub mod pattern;
pub mod pool;
pub mod routing;
pub mod sink;
pub mod telemetry;

pub use clock::{Clock, TickReport};
pub use config::Config;
pub use engine::{Engine, EngineSettings};
pub use error::{EngineError, EngineResult};
pub use handle::{CommandSender, EngineHandle};
pub use instance::{ArpeggiatorInstance, InstanceState, Transition};
pub use note_set::{NoteSet, Snapshot};
pub use pattern::{PatternError, PatternGenerator};
pub use pool::InstancePool;
pub use routing::{RoutingTable, SharedRouting};
pub use sink::{FanoutSink, NoteSink};
pub use telemetry::{ClockTelemetry, TelemetrySummary};
