//! Per-instance parameter presets.
//!
//! A preset is a plain key-value record; persisting it is up to the host.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{InstanceId, PatternMode, Route, StepRate};

/// Parameters of one arpeggiator instance, without its held notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstancePreset {
    pub mode: PatternMode,
    pub bpm: u16,
    pub root_offset: i8,
    #[serde(default)]
    pub rate: StepRate,
    #[serde(default = "default_gate")]
    pub gate: f32,
    #[serde(default = "default_octave_spread")]
    pub octave_spread: u8,
    #[serde(default)]
    pub latch: bool,
    /// `None` means "use the routing table's fallback".
    #[serde(default)]
    pub route: Option<Route>,
}

fn default_gate() -> f32 {
    0.8
}

fn default_octave_spread() -> u8 {
    2
}

impl Default for InstancePreset {
    fn default() -> Self {
        Self {
            mode: PatternMode::Up,
            bpm: 120,
            root_offset: 0,
            rate: StepRate::Quarter,
            gate: default_gate(),
            octave_spread: default_octave_spread(),
            latch: false,
            route: None,
        }
    }
}

/// Presets for a whole pool, keyed by instance id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetBank {
    pub instances: BTreeMap<InstanceId, InstancePreset>,
}

impl PresetBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: InstanceId, preset: InstancePreset) {
        self.instances.insert(id, preset);
    }

    pub fn get(&self, id: InstanceId) -> Option<&InstancePreset> {
        self.instances.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, &InstancePreset)> {
        self.instances.iter().map(|(id, preset)| (*id, preset))
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_optional_fields_take_defaults() {
        let json = r#"{"mode":"Down","bpm":90,"root_offset":-5}"#;
        let preset: InstancePreset = serde_json::from_str(json).unwrap();
        assert_eq!(preset.mode, PatternMode::Down);
        assert_eq!(preset.rate, StepRate::Quarter);
        assert!((preset.gate - 0.8).abs() < f32::EPSILON);
        assert_eq!(preset.octave_spread, 2);
        assert!(!preset.latch);
        assert_eq!(preset.route, None);
    }

    #[test]
    fn bank_is_keyed_by_instance_id() {
        let mut bank = PresetBank::new();
        bank.insert(InstanceId::new(2), InstancePreset { bpm: 140, ..Default::default() });
        bank.insert(InstanceId::new(0), InstancePreset::default());

        let json = serde_json::to_string(&bank).unwrap();
        assert!(json.contains("\"2\""));

        let ids: Vec<u32> = bank.iter().map(|(id, _)| id.get()).collect();
        assert_eq!(ids, vec![0, 2]);
        assert_eq!(bank.get(InstanceId::new(2)).map(|p| p.bpm), Some(140));
    }
}
