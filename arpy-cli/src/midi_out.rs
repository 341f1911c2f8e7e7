use arpy_core::NoteSink;
use arpy_types::ScheduledEvent;
use midir::{MidiOutput, MidiOutputConnection};

use crate::midi_in::{find_port, MidiPortInfo};

/// One open output port.
pub struct MidiOutputHandle {
    name: String,
    connection: MidiOutputConnection,
}

impl MidiOutputHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn send(&mut self, bytes: &[u8]) -> Result<(), String> {
        self.connection
            .send(bytes)
            .map_err(|e| format!("failed to send MIDI message: {}", e))
    }
}

pub fn list_ports() -> Vec<MidiPortInfo> {
    let Ok(output) = MidiOutput::new("arpy") else {
        return Vec::new();
    };
    output
        .ports()
        .iter()
        .enumerate()
        .map(|(index, port)| MidiPortInfo {
            index,
            name: output
                .port_name(port)
                .unwrap_or_else(|_| format!("Port {}", index)),
        })
        .collect()
}

/// Open the output port matching `spec` (index or name fragment).
pub fn open_port(spec: &str) -> Result<MidiOutputHandle, String> {
    let output = MidiOutput::new("arpy").map_err(|e| e.to_string())?;
    let ports = output.ports();
    let names: Vec<String> = ports
        .iter()
        .enumerate()
        .map(|(i, p)| output.port_name(p).unwrap_or_else(|_| format!("Port {}", i)))
        .collect();
    let index = find_port(&names, spec).ok_or_else(|| format!("no MIDI output port matches {:?}", spec))?;
    let name = names[index].clone();
    let connection = output
        .connect(&ports[index], "arpy-output")
        .map_err(|e| format!("failed to open MIDI output {}: {}", name, e))?;
    log::info!(target: "arpy::midi", "MIDI output opened: {}", name);
    Ok(MidiOutputHandle { name, connection })
}

/// Raw MIDI bytes for an engine event on its routed channel.
pub fn encode_event(event: &ScheduledEvent) -> [u8; 3] {
    let channel = event.route.channel & 0x0F;
    if event.is_note_off {
        [0x80 | channel, event.pitch() & 0x7F, 0]
    } else {
        [0x90 | channel, event.pitch() & 0x7F, event.velocity().clamp(1, 127)]
    }
}

/// Sends engine events to MIDI output ports. The n-th port is `DeviceId(n)`;
/// events for an unknown device go to the first port.
pub struct MidiOutputSink {
    ports: Vec<MidiOutputHandle>,
}

impl MidiOutputSink {
    pub fn new(ports: Vec<MidiOutputHandle>) -> Self {
        Self { ports }
    }

    pub fn port_names(&self) -> Vec<&str> {
        self.ports.iter().map(MidiOutputHandle::name).collect()
    }
}

impl NoteSink for MidiOutputSink {
    fn on_note_event(&mut self, event: &ScheduledEvent) {
        let device = event.route.device.get() as usize;
        let index = if device < self.ports.len() {
            device
        } else {
            log::debug!(target: "arpy::midi", "unknown output device {}, using device 0", device);
            0
        };
        let Some(port) = self.ports.get_mut(index) else {
            return;
        };
        if let Err(e) = port.send(&encode_event(event)) {
            log::warn!(target: "arpy::midi", "{}: {}", port.name, e);
        }
    }
}

/// Prints events to stdout. Used when no output port is given.
pub struct ConsoleSink;

impl NoteSink for ConsoleSink {
    fn on_note_event(&mut self, event: &ScheduledEvent) {
        println!(
            "{:>9.3}s  #{:<2} {} {:>3} vel {:>3}  ch {:>2} dev {}",
            event.timestamp.as_secs_f64(),
            event.source,
            if event.is_note_off { "off" } else { "on " },
            event.pitch(),
            event.velocity(),
            event.route.channel + 1,
            event.route.device
        );
    }
}
