//! Engine error taxonomy.
//!
//! Only construction-time misconfiguration surfaces to callers as an `Err`.
//! Everything else is absorbed where it happens (clamped, skipped, routed to a
//! fallback or self-healed) and reported through the `log` facade.

use arpy_types::InstanceId;
use thiserror::Error;

pub type EngineResult<T = ()> = Result<T, EngineError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Out-of-range tempo, offset, channel, gate... The value was clamped.
    #[error("invalid {name}: {value} (clamped to {clamped})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        clamped: String,
    },

    /// No held notes at tick time. The tick was skipped.
    #[error("instance {0} has no notes to arpeggiate")]
    EmptyPatternInput(InstanceId),

    /// No route configured. The default destination was used.
    #[error("no route for instance {0}, using default")]
    RoutingMiss(InstanceId),

    /// A defect: duplicate pitch in a note set, cursor out of range.
    #[error("invariant violated on instance {instance}: {detail}")]
    InvariantViolation { instance: InstanceId, detail: String },

    /// A command addressed an instance the pool does not own.
    #[error("unknown instance {0}")]
    UnknownInstance(InstanceId),

    #[error("pool size must be between 1 and {max}, got {requested}")]
    InvalidPoolSize { requested: usize, max: usize },

    #[error("config error: {0}")]
    Config(String),

    #[error("engine thread unavailable: {0}")]
    Disconnected(String),
}

impl EngineError {
    pub(crate) fn clamped<T: std::fmt::Display, U: std::fmt::Display>(
        name: &'static str,
        value: T,
        clamped: U,
    ) -> Self {
        EngineError::InvalidParameter {
            name,
            value: value.to_string(),
            clamped: clamped.to_string(),
        }
    }
}
