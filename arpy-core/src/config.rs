//! Engine configuration from TOML.
//!
//! Defaults ship embedded in the binary (`config.toml` next to this crate's
//! manifest). A user file at `<config_dir>/arpy/config.toml` overrides them
//! key by key. Instance parameters and runtime intervals are clamped into
//! range; the pool size is passed through as given so that
//! [`crate::Engine::new`] can refuse a bad one.

use std::path::{Path, PathBuf};
use std::time::Duration;

use arpy_types::{DeviceId, InstancePreset, PatternMode, Route, StepRate};
use serde::Deserialize;

use crate::engine::EngineSettings;
use crate::error::{EngineError, EngineResult};
use crate::instance::{
    MAX_BPM, MAX_GATE, MAX_OCTAVE_SPREAD, MAX_ROOT_OFFSET, MIN_BPM, MIN_GATE, MIN_OCTAVE_SPREAD,
    MIN_ROOT_OFFSET,
};

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    defaults: DefaultsConfig,
    #[serde(default)]
    runtime: RuntimeConfig,
}

#[derive(Deserialize, Default)]
struct DefaultsConfig {
    pool_size: Option<usize>,
    bpm: Option<u32>,
    mode: Option<String>,
    rate: Option<String>,
    gate: Option<f32>,
    root_offset: Option<i32>,
    octave_spread: Option<u8>,
    strum_spacing_ms: Option<u64>,
    latch: Option<bool>,
    channel: Option<u8>,
    device: Option<u16>,
    seed: Option<u64>,
}

#[derive(Deserialize, Default)]
struct RuntimeConfig {
    tick_interval_us: Option<u64>,
    telemetry_interval_secs: Option<u64>,
}

/// Merged configuration. Build settings for the engine with
/// [`Config::engine_settings`].
pub struct Config {
    defaults: DefaultsConfig,
    runtime: RuntimeConfig,
}

impl Config {
    /// Embedded defaults overlaid with `<config_dir>/arpy/config.toml`.
    pub fn load() -> Self {
        Self::load_from(user_config_path().as_deref())
    }

    /// Embedded defaults overlaid with the file at `path`, if it exists.
    /// A malformed or unreadable file is logged and ignored.
    pub fn load_from(path: Option<&Path>) -> Self {
        let mut base = embedded();

        if let Some(path) = path {
            if path.exists() {
                match std::fs::read_to_string(path) {
                    Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                        Ok(user) => base.merge(user),
                        Err(e) => {
                            log::warn!(target: "arpy::config", "ignoring malformed config {}: {}", path.display(), e)
                        }
                    },
                    Err(e) => {
                        log::warn!(target: "arpy::config", "could not read config {}: {}", path.display(), e)
                    }
                }
            }
        }

        Config {
            defaults: base.defaults,
            runtime: base.runtime,
        }
    }

    /// Embedded defaults overlaid with `user`. Unlike `load`, a parse error
    /// is returned to the caller.
    pub fn parse(user: &str) -> EngineResult<Self> {
        let user: ConfigFile = toml::from_str(user).map_err(|e| EngineError::Config(e.to_string()))?;
        let mut base = embedded();
        base.merge(user);
        Ok(Config {
            defaults: base.defaults,
            runtime: base.runtime,
        })
    }

    /// Requested number of instances, unchecked. Outside 1..=16 engine
    /// construction fails with `InvalidPoolSize`.
    pub fn pool_size(&self) -> usize {
        self.defaults.pool_size.unwrap_or(4)
    }

    /// Starting parameters for every instance. The route is the fallback
    /// destination for instances without one of their own.
    pub fn instance_defaults(&self) -> InstancePreset {
        let fallback = InstancePreset::default();
        InstancePreset {
            mode: self
                .defaults
                .mode
                .as_deref()
                .and_then(parse_mode)
                .unwrap_or(fallback.mode),
            bpm: self
                .defaults
                .bpm
                .map(|bpm| bpm.clamp(MIN_BPM as u32, MAX_BPM as u32) as u16)
                .unwrap_or(fallback.bpm),
            root_offset: self
                .defaults
                .root_offset
                .map(|n| n.clamp(MIN_ROOT_OFFSET as i32, MAX_ROOT_OFFSET as i32) as i8)
                .unwrap_or(fallback.root_offset),
            rate: self
                .defaults
                .rate
                .as_deref()
                .and_then(parse_rate)
                .unwrap_or(fallback.rate),
            gate: self
                .defaults
                .gate
                .filter(|g| !g.is_nan())
                .map(|g| g.clamp(MIN_GATE, MAX_GATE))
                .unwrap_or(fallback.gate),
            octave_spread: self
                .defaults
                .octave_spread
                .map(|n| n.clamp(MIN_OCTAVE_SPREAD, MAX_OCTAVE_SPREAD))
                .unwrap_or(fallback.octave_spread),
            latch: self.defaults.latch.unwrap_or(fallback.latch),
            route: Some(Route::new(
                self.defaults.channel.unwrap_or(0),
                DeviceId::new(self.defaults.device.unwrap_or(0)),
            )),
        }
    }

    /// Gap between strummed chord notes (clamped to 0..=100 ms).
    pub fn strum_spacing(&self) -> Duration {
        Duration::from_millis(self.defaults.strum_spacing_ms.unwrap_or(8).min(100))
    }

    /// Base seed for Random/Flow; instance `n` uses `seed + n`.
    pub fn seed(&self) -> u64 {
        self.defaults.seed.unwrap_or(0)
    }

    /// Engine thread tick interval (clamped to 100us..=10ms).
    pub fn tick_interval(&self) -> Duration {
        Duration::from_micros(
            self.runtime
                .tick_interval_us
                .unwrap_or(1000)
                .clamp(100, 10_000),
        )
    }

    /// How often the engine thread logs telemetry (clamped to 1..=3600 s).
    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_secs(
            self.runtime
                .telemetry_interval_secs
                .unwrap_or(10)
                .clamp(1, 3600),
        )
    }

    /// Everything [`crate::Engine::new`] and [`crate::EngineHandle::spawn`] need.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            pool_size: self.pool_size(),
            defaults: self.instance_defaults(),
            strum_spacing: self.strum_spacing(),
            seed: self.seed(),
            tick_interval: self.tick_interval(),
            telemetry_interval: self.telemetry_interval(),
        }
    }
}

/// Directory holding the user config, log file and saved presets.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("arpy"))
}

fn user_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

fn embedded() -> ConfigFile {
    match toml::from_str(DEFAULT_CONFIG) {
        Ok(base) => base,
        Err(e) => {
            log::error!(target: "arpy::config", "embedded config.toml is malformed: {}", e);
            ConfigFile::default()
        }
    }
}

impl ConfigFile {
    fn merge(&mut self, user: ConfigFile) {
        merge_defaults(&mut self.defaults, user.defaults);
        merge_runtime(&mut self.runtime, user.runtime);
    }
}

fn merge_defaults(base: &mut DefaultsConfig, user: DefaultsConfig) {
    if user.pool_size.is_some() {
        base.pool_size = user.pool_size;
    }
    if user.bpm.is_some() {
        base.bpm = user.bpm;
    }
    if user.mode.is_some() {
        base.mode = user.mode;
    }
    if user.rate.is_some() {
        base.rate = user.rate;
    }
    if user.gate.is_some() {
        base.gate = user.gate;
    }
    if user.root_offset.is_some() {
        base.root_offset = user.root_offset;
    }
    if user.octave_spread.is_some() {
        base.octave_spread = user.octave_spread;
    }
    if user.strum_spacing_ms.is_some() {
        base.strum_spacing_ms = user.strum_spacing_ms;
    }
    if user.latch.is_some() {
        base.latch = user.latch;
    }
    if user.channel.is_some() {
        base.channel = user.channel;
    }
    if user.device.is_some() {
        base.device = user.device;
    }
    if user.seed.is_some() {
        base.seed = user.seed;
    }
}

fn merge_runtime(base: &mut RuntimeConfig, user: RuntimeConfig) {
    if user.tick_interval_us.is_some() {
        base.tick_interval_us = user.tick_interval_us;
    }
    if user.telemetry_interval_secs.is_some() {
        base.telemetry_interval_secs = user.telemetry_interval_secs;
    }
}

fn parse_mode(s: &str) -> Option<PatternMode> {
    let mode = PatternMode::from_name(s);
    if mode.is_none() {
        log::warn!(target: "arpy::config", "unknown mode {:?}, using default", s);
    }
    mode
}

fn parse_rate(s: &str) -> Option<StepRate> {
    let rate = StepRate::from_name(s);
    if rate.is_none() {
        log::warn!(target: "arpy::config", "unknown rate {:?}, using default", s);
    }
    rate
}
