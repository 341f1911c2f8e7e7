use arpy_core::CommandSender;
use arpy_types::{EngineCommand, Target};
use midir::{MidiInput, MidiInputConnection};

/// Channel messages the arpeggiator cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEventKind {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
}

impl MidiEventKind {
    /// Engine command for this message, broadcast to every instance.
    /// Control changes are not held notes and map to nothing.
    pub fn to_command(self) -> Option<EngineCommand> {
        match self {
            MidiEventKind::NoteOn { note, velocity, .. } => Some(EngineCommand::NoteOn {
                pitch: note,
                velocity,
                target: Target::All,
            }),
            MidiEventKind::NoteOff { note, .. } => Some(EngineCommand::NoteOff {
                pitch: note,
                target: Target::All,
            }),
            MidiEventKind::ControlChange { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MidiPortInfo {
    pub index: usize,
    pub name: String,
}

/// MIDI input: forwards held-note messages from one port into the engine.
pub struct MidiInputManager {
    connection: Option<MidiInputConnection<()>>,
    connected_port_name: Option<String>,
}

impl MidiInputManager {
    pub fn new() -> Self {
        Self {
            connection: None,
            connected_port_name: None,
        }
    }

    pub fn list_ports() -> Vec<MidiPortInfo> {
        let Ok(midi_in) = MidiInput::new("arpy") else {
            return Vec::new();
        };
        midi_in
            .ports()
            .iter()
            .enumerate()
            .filter_map(|(index, port)| {
                midi_in
                    .port_name(port)
                    .ok()
                    .map(|name| MidiPortInfo { index, name })
            })
            .collect()
    }

    pub fn connected_port_name(&self) -> Option<&str> {
        self.connected_port_name.as_deref()
    }

    /// Connect to the port matching `spec` (index or name fragment) and feed
    /// its notes to the engine through `sender`.
    pub fn connect(&mut self, spec: &str, sender: CommandSender) -> Result<(), String> {
        self.disconnect();

        let midi_in = MidiInput::new("arpy").map_err(|e| e.to_string())?;
        let ports = midi_in.ports();
        let names: Vec<String> = ports
            .iter()
            .map(|p| midi_in.port_name(p).unwrap_or_else(|_| "Unknown".to_string()))
            .collect();
        let index = find_port(&names, spec).ok_or_else(|| format!("no MIDI input port matches {:?}", spec))?;
        let port_name = names[index].clone();

        let connection = midi_in
            .connect(
                &ports[index],
                "arpy-input",
                move |_timestamp, message, _| match parse_midi_message(message).and_then(MidiEventKind::to_command) {
                    Some(cmd) => sender.command(cmd),
                    None => log::trace!(target: "arpy::midi", "ignoring MIDI message {:02X?}", message),
                },
                (),
            )
            .map_err(|e| e.to_string())?;

        log::info!(target: "arpy::midi", "MIDI input connected: {}", port_name);
        self.connection = Some(connection);
        self.connected_port_name = Some(port_name);
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close();
        }
        self.connected_port_name = None;
    }
}

impl Default for MidiInputManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MidiInputManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Pick a port by index ("1") or by case-insensitive name fragment.
pub fn find_port(names: &[String], spec: &str) -> Option<usize> {
    if let Ok(index) = spec.parse::<usize>() {
        return (index < names.len()).then_some(index);
    }
    let needle = spec.to_lowercase();
    names.iter().position(|name| name.to_lowercase().contains(&needle))
}

/// Parse a raw MIDI message. Only note and control-change messages are kept.
pub fn parse_midi_message(data: &[u8]) -> Option<MidiEventKind> {
    if data.len() < 3 {
        return None;
    }

    let status = data[0];
    let channel = status & 0x0F;

    match status & 0xF0 {
        0x80 => Some(MidiEventKind::NoteOff { channel, note: data[1] }),
        // Note On with velocity 0 is a note off
        0x90 if data[2] == 0 => Some(MidiEventKind::NoteOff { channel, note: data[1] }),
        0x90 => Some(MidiEventKind::NoteOn {
            channel,
            note: data[1],
            velocity: data[2],
        }),
        0xB0 => Some(MidiEventKind::ControlChange {
            channel,
            controller: data[1],
            value: data[2],
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_note_on_and_off() {
        assert_eq!(
            parse_midi_message(&[0x93, 60, 100]),
            Some(MidiEventKind::NoteOn { channel: 3, note: 60, velocity: 100 })
        );
        assert_eq!(
            parse_midi_message(&[0x80, 60, 64]),
            Some(MidiEventKind::NoteOff { channel: 0, note: 60 })
        );
    }

    #[test]
    fn zero_velocity_note_on_is_note_off() {
        assert_eq!(
            parse_midi_message(&[0x90, 62, 0]),
            Some(MidiEventKind::NoteOff { channel: 0, note: 62 })
        );
    }

    #[test]
    fn other_messages_are_dropped() {
        assert_eq!(parse_midi_message(&[0xE0, 0, 64]), None);
        assert_eq!(parse_midi_message(&[0xC0, 5]), None);
        assert_eq!(parse_midi_message(&[]), None);
    }

    #[test]
    fn control_change_maps_to_no_command() {
        let cc = parse_midi_message(&[0xB0, 64, 127]).unwrap();
        assert_eq!(cc.to_command(), None);
        let on = parse_midi_message(&[0x90, 60, 90]).unwrap();
        assert_eq!(
            on.to_command(),
            Some(EngineCommand::NoteOn { pitch: 60, velocity: 90, target: Target::All })
        );
    }

    #[test]
    fn ports_resolve_by_index_or_name() {
        let names = vec!["Midi Through".to_string(), "KeyStep Pro".to_string()];
        assert_eq!(find_port(&names, "1"), Some(1));
        assert_eq!(find_port(&names, "keystep"), Some(1));
        assert_eq!(find_port(&names, "7"), None);
        assert_eq!(find_port(&names, "launchpad"), None);
    }
}
