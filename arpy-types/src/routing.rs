use serde::{Deserialize, Serialize};

/// Highest valid MIDI channel (0-based).
pub const MAX_CHANNEL: u8 = 15;

/// Identifier of an output device known to the host. The engine never
/// interprets it; sinks map it onto a concrete port.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DeviceId(u16);

impl DeviceId {
    pub fn new(id: u16) -> Self {
        Self(id)
    }
    pub fn get(self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Destination of an instance's note events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    /// MIDI channel, 0-15
    pub channel: u8,
    pub device: DeviceId,
}

impl Route {
    /// Build a route, clamping the channel into 0..=15.
    pub fn new(channel: u8, device: DeviceId) -> Self {
        Self {
            channel: channel.min(MAX_CHANNEL),
            device,
        }
    }
}
