//! Preset banks on disk, as pretty-printed JSON keyed by instance id.

use std::io;
use std::path::{Path, PathBuf};

use arpy_types::PresetBank;

/// Default location for `save` without a path.
pub fn default_path() -> PathBuf {
    arpy_core::config::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("presets.json")
}

pub fn load_bank(path: &Path) -> io::Result<PresetBank> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

pub fn save_bank(path: &Path, bank: &PresetBank) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(bank).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use arpy_types::{DeviceId, InstanceId, InstancePreset, PatternMode, Route};

    use super::*;

    #[test]
    fn bank_survives_a_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("bank.json");

        let mut bank = PresetBank::new();
        bank.insert(InstanceId::new(0), InstancePreset::default());
        bank.insert(
            InstanceId::new(3),
            InstancePreset {
                mode: PatternMode::HighAlternateDown,
                bpm: 174,
                root_offset: -5,
                route: Some(Route::new(9, DeviceId::new(1))),
                ..InstancePreset::default()
            },
        );

        save_bank(&path, &bank).unwrap();
        assert_eq!(load_bank(&path).unwrap(), bank);
    }

    #[test]
    fn garbage_is_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_bank(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_bank(&dir.path().join("missing.json")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
