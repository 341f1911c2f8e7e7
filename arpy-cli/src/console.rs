//! Line-based console for live parameter changes.

use std::path::PathBuf;

use arpy_types::{DeviceId, EngineCommand, InstanceId, PatternMode, StepRate, Target};

pub const HELP: &str = "\
commands:
  mode <id> <name>              up, down, updown, downup, random, flow, convergeup, ...
  tempo <id> <bpm>              20-999
  offset <id> <semitones>       -12..12
  latch <id> on|off
  route <id> <channel> <device> channel 1-16, device = n-th --out port
  rate <id> 1/4|1/8|1/16|1/32
  gate <id> <fraction>          0.05-1.0
  spread <id> <octaves>         1-4
  on <pitch> [velocity]         press a key on every instance
  off <pitch>                   release it
  clear <id|all>                drop held notes, latched ones too
  stop <id|all>                 silence now
  save [file]  load <file>      preset bank as JSON
  modes  show  help  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Engine(EngineCommand),
    Save(Option<PathBuf>),
    Load(PathBuf),
    Show,
    Modes,
    Help,
    Quit,
}

/// Parse one console line. Blank lines and `#` comments yield `Ok(None)`.
pub fn parse_command(line: &str, pool_size: usize) -> Result<Option<ConsoleCommand>, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, args)) = words.split_first() else {
        return Ok(None);
    };
    if verb.starts_with('#') {
        return Ok(None);
    }

    let cmd = match verb.to_lowercase().as_str() {
        "mode" => {
            let [id, name] = exact::<2>(args, "mode <id> <name>")?;
            let mode = PatternMode::from_name(name).ok_or_else(|| format!("unknown mode {:?}", name))?;
            engine(EngineCommand::SetMode { instance: instance(id, pool_size)?, mode })
        }
        "tempo" | "bpm" => {
            let [id, bpm] = exact::<2>(args, "tempo <id> <bpm>")?;
            engine(EngineCommand::SetTempo {
                instance: instance(id, pool_size)?,
                bpm: number(bpm)?,
            })
        }
        "offset" | "root" => {
            let [id, n] = exact::<2>(args, "offset <id> <semitones>")?;
            engine(EngineCommand::SetRootOffset {
                instance: instance(id, pool_size)?,
                semitones: number(n)?,
            })
        }
        "latch" => {
            let [id, flag] = exact::<2>(args, "latch <id> on|off")?;
            let enabled = match flag.to_lowercase().as_str() {
                "on" | "true" | "1" => true,
                "off" | "false" | "0" => false,
                _ => return Err(format!("expected on or off, got {:?}", flag)),
            };
            engine(EngineCommand::SetLatch { instance: instance(id, pool_size)?, enabled })
        }
        "route" => {
            let [id, channel, device] = exact::<3>(args, "route <id> <channel> <device>")?;
            let channel: u8 = number(channel)?;
            if !(1..=16).contains(&channel) {
                return Err(format!("channel must be 1-16, got {}", channel));
            }
            engine(EngineCommand::SetRouting {
                instance: instance(id, pool_size)?,
                channel: channel - 1,
                device: DeviceId::new(number(device)?),
            })
        }
        "rate" => {
            let [id, rate] = exact::<2>(args, "rate <id> 1/4|1/8|1/16|1/32")?;
            let rate = StepRate::from_name(rate).ok_or_else(|| format!("unknown rate {:?}", rate))?;
            engine(EngineCommand::SetRate { instance: instance(id, pool_size)?, rate })
        }
        "gate" => {
            let [id, gate] = exact::<2>(args, "gate <id> <fraction>")?;
            engine(EngineCommand::SetGate {
                instance: instance(id, pool_size)?,
                gate: number(gate)?,
            })
        }
        "spread" | "octaves" => {
            let [id, n] = exact::<2>(args, "spread <id> <octaves>")?;
            engine(EngineCommand::SetOctaveSpread {
                instance: instance(id, pool_size)?,
                octaves: number(n)?,
            })
        }
        "on" => {
            let (pitch, velocity) = match args {
                [pitch] => (number(pitch)?, 100),
                [pitch, velocity] => (number(pitch)?, number(velocity)?),
                _ => return Err("usage: on <pitch> [velocity]".to_string()),
            };
            engine(EngineCommand::NoteOn { pitch, velocity, target: Target::All })
        }
        "off" => {
            let [pitch] = exact::<1>(args, "off <pitch>")?;
            engine(EngineCommand::NoteOff { pitch: number(pitch)?, target: Target::All })
        }
        "clear" => {
            let [which] = exact::<1>(args, "clear <id|all>")?;
            engine(EngineCommand::Clear { target: target(which, pool_size)? })
        }
        "stop" => {
            let target = match args {
                [] => Target::All,
                [which] => target(which, pool_size)?,
                _ => return Err("usage: stop <id|all>".to_string()),
            };
            engine(EngineCommand::Stop { target })
        }
        "save" => match args {
            [] => ConsoleCommand::Save(None),
            [path] => ConsoleCommand::Save(Some(PathBuf::from(path))),
            _ => return Err("usage: save [file]".to_string()),
        },
        "load" => {
            let [path] = exact::<1>(args, "load <file>")?;
            ConsoleCommand::Load(PathBuf::from(path))
        }
        "show" => ConsoleCommand::Show,
        "modes" => ConsoleCommand::Modes,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command {:?} (try help)", other)),
    };
    Ok(Some(cmd))
}

fn engine(cmd: EngineCommand) -> ConsoleCommand {
    ConsoleCommand::Engine(cmd)
}

fn exact<'a, const N: usize>(args: &[&'a str], usage: &str) -> Result<[&'a str; N], String> {
    <[&'a str; N]>::try_from(args).map_err(|_| format!("usage: {}", usage))
}

fn number<T: std::str::FromStr>(s: &str) -> Result<T, String> {
    s.parse().map_err(|_| format!("not a valid number: {:?}", s))
}

fn instance(s: &str, pool_size: usize) -> Result<InstanceId, String> {
    let id: u32 = number(s)?;
    if (id as usize) < pool_size {
        Ok(InstanceId::new(id))
    } else {
        Err(format!("instance {} out of range (0-{})", id, pool_size.saturating_sub(1)))
    }
}

fn target(s: &str, pool_size: usize) -> Result<Target, String> {
    if s.eq_ignore_ascii_case("all") {
        return Ok(Target::All);
    }
    let ids = s
        .split(',')
        .map(|part| instance(part.trim(), pool_size))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Target::Only(ids))
}
