mod console;
mod midi_in;
mod midi_out;
mod presets;

use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use arpy_core::config::{self, Config};
use arpy_core::{EngineHandle, NoteSink};
use arpy_types::PatternMode;

use console::{parse_command, ConsoleCommand};
use midi_in::MidiInputManager;
use midi_out::{ConsoleSink, MidiOutputSink};

const USAGE: &str = "\
usage: arpy [options]
  --list               list MIDI ports and exit
  --in <port>          MIDI input port (index or name fragment)
  --out <port>         MIDI output port, repeatable; the n-th is device n
  --instances <n>      number of arpeggiators (1-16)
  --preset <file>      preset bank to load at start
  --seed <n>           random seed for Random/Flow
  --verbose, -v        debug logging";

fn init_logging(verbose: bool) {
    use simplelog::{LevelFilter, WriteLogger};

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };

    let log_path = config::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("arpy.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = match File::create(&log_path).or_else(|_| File::create("/tmp/arpy.log")) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("logging disabled: cannot create log file: {}", e);
            return;
        }
    };

    if let Err(e) = WriteLogger::init(log_level, simplelog::Config::default(), log_file) {
        eprintln!("logging disabled: {}", e);
        return;
    }

    log::info!("arpy starting (log level: {:?})", log_level);
}

#[derive(Debug, Default, PartialEq)]
struct Args {
    list: bool,
    verbose: bool,
    input: Option<String>,
    outputs: Vec<String>,
    instances: Option<usize>,
    preset: Option<PathBuf>,
    seed: Option<u64>,
}

impl Args {
    fn parse(args: &[String]) -> Result<Args, String> {
        let mut parsed = Args::default();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let mut value = |flag: &str| {
                iter.next()
                    .cloned()
                    .ok_or_else(|| format!("{} needs a value", flag))
            };
            match arg.as_str() {
                "--list" => parsed.list = true,
                "--verbose" | "-v" => parsed.verbose = true,
                "--in" => parsed.input = Some(value("--in")?),
                "--out" => parsed.outputs.push(value("--out")?),
                "--instances" => {
                    let n = value("--instances")?;
                    parsed.instances = Some(n.parse().map_err(|_| format!("bad --instances {:?}", n))?);
                }
                "--preset" => parsed.preset = Some(PathBuf::from(value("--preset")?)),
                "--seed" => {
                    let n = value("--seed")?;
                    parsed.seed = Some(n.parse().map_err(|_| format!("bad --seed {:?}", n))?);
                }
                "--help" | "-h" => return Err(USAGE.to_string()),
                other => return Err(format!("unknown argument {:?}\n{}", other, USAGE)),
            }
        }
        Ok(parsed)
    }
}

fn main() -> io::Result<()> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = match Args::parse(&argv) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}", msg);
            std::process::exit(2);
        }
    };
    init_logging(args.verbose);

    if args.list {
        println!("MIDI inputs:");
        for port in MidiInputManager::list_ports() {
            println!("  {}: {}", port.index, port.name);
        }
        println!("MIDI outputs:");
        for port in midi_out::list_ports() {
            println!("  {}: {}", port.index, port.name);
        }
        return Ok(());
    }

    let mut settings = Config::load().engine_settings();
    if let Some(n) = args.instances {
        settings.pool_size = n;
    }
    if let Some(seed) = args.seed {
        settings.seed = seed;
    }

    let sink: Box<dyn NoteSink + Send> = if args.outputs.is_empty() {
        Box::new(ConsoleSink)
    } else {
        let mut ports = Vec::new();
        for spec in &args.outputs {
            ports.push(midi_out::open_port(spec).map_err(io::Error::other)?);
        }
        let sink = MidiOutputSink::new(ports);
        for (device, name) in sink.port_names().iter().enumerate() {
            println!("device {} -> {}", device, name);
        }
        Box::new(sink)
    };

    let handle = EngineHandle::spawn(settings, sink).map_err(io::Error::other)?;

    if let Some(path) = &args.preset {
        let bank = presets::load_bank(path)?;
        handle.apply_bank(&bank);
        println!("loaded {} preset(s) from {}", bank.len(), path.display());
    }

    let mut midi_in = MidiInputManager::new();
    if let Some(spec) = &args.input {
        midi_in.connect(spec, handle.sender()).map_err(io::Error::other)?;
        if let Some(name) = midi_in.connected_port_name() {
            println!("listening on {}", name);
        }
    }

    println!("{} arpeggiator(s) ready. Type help for commands.", handle.pool_size());
    let result = run_console(&handle);

    midi_in.disconnect();
    handle.shutdown();
    result
}

fn run_console(handle: &EngineHandle) -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = line?;
        match parse_command(&line, handle.pool_size()) {
            Ok(None) => {}
            Ok(Some(ConsoleCommand::Quit)) => break,
            Ok(Some(cmd)) => {
                if let Err(e) = execute(handle, cmd) {
                    println!("error: {}", e);
                }
            }
            Err(msg) => println!("{}", msg),
        }
        stdout.flush()?;
    }
    Ok(())
}

fn execute(handle: &EngineHandle, cmd: ConsoleCommand) -> Result<(), String> {
    match cmd {
        ConsoleCommand::Engine(cmd) => handle.command(cmd),
        ConsoleCommand::Save(path) => {
            let path = path.unwrap_or_else(presets::default_path);
            let bank = handle.presets().map_err(|e| e.to_string())?;
            presets::save_bank(&path, &bank).map_err(|e| e.to_string())?;
            println!("saved {} preset(s) to {}", bank.len(), path.display());
        }
        ConsoleCommand::Load(path) => {
            let bank = presets::load_bank(&path).map_err(|e| format!("{}: {}", path.display(), e))?;
            handle.apply_bank(&bank);
            println!("loaded {} preset(s)", bank.len());
        }
        ConsoleCommand::Show => {
            let bank = handle.presets().map_err(|e| e.to_string())?;
            let fallback = handle.routing().map_err(|e| e.to_string())?.fallback();
            for (id, p) in bank.iter() {
                let route = p.route.unwrap_or(fallback);
                println!(
                    "#{:<2} {:<18} {:>3} bpm {:<5} gate {:.2} offset {:+} spread {} latch {} ch {} dev {}",
                    id,
                    p.mode.name(),
                    p.bpm,
                    p.rate.name(),
                    p.gate,
                    p.root_offset,
                    p.octave_spread,
                    if p.latch { "on" } else { "off" },
                    route.channel + 1,
                    route.device
                );
            }
            let t = handle.telemetry().map_err(|e| e.to_string())?;
            println!(
                "tick avg {}us p95 {}us max {}us, overruns {}, dropped steps {}",
                t.avg_tick_us, t.p95_tick_us, t.max_tick_us, t.overruns, t.dropped_steps
            );
        }
        ConsoleCommand::Modes => {
            let names: Vec<&str> = PatternMode::ALL.iter().map(PatternMode::name).collect();
            println!("{}", names.join(", "));
        }
        ConsoleCommand::Help => println!("{}", console::HELP),
        ConsoleCommand::Quit => {}
    }
    Ok(())
}
