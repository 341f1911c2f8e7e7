use std::collections::HashMap;
use std::time::Duration;

use arpy_core::{Engine, EngineSettings};
use arpy_types::{DeviceId, EngineCommand, InstanceId, PatternMode, Route, ScheduledEvent, Target};

const MS: Duration = Duration::from_millis(1);

fn engine(pool_size: usize) -> Engine {
    Engine::new(&EngineSettings {
        pool_size,
        ..EngineSettings::default()
    })
    .unwrap()
}

fn id(n: u32) -> InstanceId {
    InstanceId::new(n)
}

fn hold(engine: &mut Engine, pitches: &[u8], at: Duration, out: &mut Vec<ScheduledEvent>) {
    for &pitch in pitches {
        engine.apply(
            EngineCommand::NoteOn { pitch, velocity: 100, target: Target::All },
            at,
            out,
        );
    }
}

/// Tick every millisecond from `from` to `to` inclusive.
fn run(engine: &mut Engine, from: u64, to: u64, out: &mut Vec<ScheduledEvent>) {
    for t in from..=to {
        engine.tick(MS * t as u32, out);
    }
}

fn note_ons(events: &[ScheduledEvent], source: InstanceId) -> Vec<u8> {
    events
        .iter()
        .filter(|e| e.source == source && e.is_note_on())
        .map(|e| e.pitch())
        .collect()
}

/// Panics unless every note-on is released exactly once before the next
/// note-on from the same instance (strum bursts count as one step).
fn assert_balanced(events: &[ScheduledEvent]) {
    let mut sounding: HashMap<InstanceId, Vec<u8>> = HashMap::new();
    let mut releasing: HashMap<InstanceId, bool> = HashMap::new();
    for e in events {
        let notes = sounding.entry(e.source).or_default();
        if e.is_note_on() {
            if releasing.get(&e.source).copied().unwrap_or(false) {
                assert!(notes.is_empty(), "note-on at {:?} while {:?} still sounding", e.timestamp, notes);
            }
            releasing.insert(e.source, false);
            notes.push(e.pitch());
        } else {
            let pos = notes
                .iter()
                .position(|&p| p == e.pitch())
                .unwrap_or_else(|| panic!("note-off for {} that is not sounding", e.pitch()));
            notes.remove(pos);
            releasing.insert(e.source, true);
        }
    }
}

fn assert_time_ordered(events: &[ScheduledEvent]) {
    for pair in events.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp, "{:?} after {:?}", pair[1], pair[0]);
    }
}

#[test]
fn up_mode_cycles_c_major_at_120_bpm() {
    let mut engine = engine(1);
    let mut out = Vec::new();
    hold(&mut engine, &[60, 64, 67], Duration::ZERO, &mut out);
    run(&mut engine, 0, 3200, &mut out);

    assert_eq!(note_ons(&out, id(0)), vec![60, 64, 67, 60, 64, 67, 60]);
    let times: Vec<Duration> = out.iter().filter(|e| e.is_note_on()).map(|e| e.timestamp).collect();
    assert_eq!(times[1] - times[0], MS * 500);
    assert_balanced(&out);
    assert_time_ordered(&out);
}

#[test]
fn down_mode_cycles_descending() {
    let mut engine = engine(1);
    let mut out = Vec::new();
    engine.set_mode(id(0), PatternMode::Down);
    hold(&mut engine, &[60, 64, 67], Duration::ZERO, &mut out);
    run(&mut engine, 0, 2600, &mut out);
    assert_eq!(note_ons(&out, id(0)), vec![67, 64, 60, 67, 64, 60]);
}

#[test]
fn chord_strum_plays_the_whole_chord_each_step() {
    let mut engine = engine(1);
    let mut out = Vec::new();
    engine.set_mode(id(0), PatternMode::ChordStrum);
    hold(&mut engine, &[48, 52, 55, 60, 64, 67], Duration::ZERO, &mut out);
    run(&mut engine, 0, 999, &mut out);

    let chord = vec![48, 52, 55, 60, 64, 67];
    let first_step: Vec<&ScheduledEvent> = out.iter().filter(|e| e.timestamp < MS * 500).collect();
    let ons: Vec<u8> = first_step.iter().filter(|e| e.is_note_on()).map(|e| e.pitch()).collect();
    let offs: Vec<u8> = first_step.iter().filter(|e| e.is_note_off).map(|e| e.pitch()).collect();
    assert_eq!(ons, chord);
    assert_eq!(offs, chord);
    assert!(first_step.iter().all(|e| e.timestamp < MS * 500));
    assert_eq!(note_ons(&out, id(0)).len(), 12);
    assert_balanced(&out);
}

#[test]
fn root_offset_shifts_output_not_held_notes() {
    let mut engine = engine(1);
    let mut out = Vec::new();
    engine.set_root_offset(id(0), 12);
    hold(&mut engine, &[60, 64, 67], Duration::ZERO, &mut out);
    run(&mut engine, 0, 1600, &mut out);

    assert_eq!(note_ons(&out, id(0)), vec![72, 76, 79, 72]);
    let held = engine.instance(id(0)).unwrap().snapshot().sorted_pitches();
    assert_eq!(held, vec![60, 64, 67]);
}

#[test]
fn sixteen_instances_start_together_and_diverge_by_mode() {
    let mut engine = engine(16);
    let mut out = Vec::new();
    engine.set_mode(id(3), PatternMode::Down);
    engine.set_tempo(id(7), 240);
    hold(&mut engine, &[60, 64, 67], Duration::ZERO, &mut out);
    run(&mut engine, 0, 1100, &mut out);

    let firsts: Vec<&ScheduledEvent> = out.iter().filter(|e| e.timestamp == Duration::ZERO).collect();
    assert_eq!(firsts.len(), 16);
    let sources: Vec<u32> = firsts.iter().map(|e| e.source.get()).collect();
    assert_eq!(sources, (0..16).collect::<Vec<u32>>());

    assert_eq!(note_ons(&out, id(0)), vec![60, 64, 67]);
    assert_eq!(note_ons(&out, id(15)), vec![60, 64, 67]);
    assert_eq!(note_ons(&out, id(3)), vec![67, 64, 60]);
    assert_eq!(note_ons(&out, id(7)), vec![60, 64, 67, 60, 64]);
    assert_balanced(&out);
    assert_time_ordered(&out);
}

#[test]
fn subset_broadcast_reaches_only_its_targets() {
    let mut engine = engine(4);
    let mut out = Vec::new();
    engine.apply(
        EngineCommand::NoteOn { pitch: 62, velocity: 80, target: Target::Only(vec![id(1), id(3)]) },
        Duration::ZERO,
        &mut out,
    );
    run(&mut engine, 0, 10, &mut out);
    let sources: Vec<u32> = out.iter().map(|e| e.source.get()).collect();
    assert_eq!(sources, vec![1, 3]);
}

#[test]
fn latch_sustains_released_keys() {
    let mut engine = engine(1);
    let mut out = Vec::new();
    hold(&mut engine, &[60, 64, 67], Duration::ZERO, &mut out);
    engine.apply(EngineCommand::SetLatch { instance: id(0), enabled: true }, MS * 10, &mut out);
    for pitch in [60, 64, 67] {
        engine.apply(EngineCommand::NoteOff { pitch, target: Target::All }, MS * 20, &mut out);
    }
    run(&mut engine, 20, 1600, &mut out);
    assert_eq!(note_ons(&out, id(0)), vec![60, 64, 67, 60]);
    assert_eq!(engine.instance(id(0)).unwrap().snapshot().len(), 3);

    engine.apply(EngineCommand::SetLatch { instance: id(0), enabled: false }, MS * 1700, &mut out);
    engine.apply(EngineCommand::NoteOff { pitch: 64, target: Target::All }, MS * 1700, &mut out);
    assert_eq!(engine.instance(id(0)).unwrap().snapshot().sorted_pitches(), vec![60, 67]);
}

#[test]
fn fresh_press_after_latched_release_replaces_the_chord() {
    let mut engine = engine(1);
    let mut out = Vec::new();
    hold(&mut engine, &[60, 64, 67], Duration::ZERO, &mut out);
    engine.apply(EngineCommand::SetLatch { instance: id(0), enabled: true }, MS * 10, &mut out);
    for pitch in [60, 64, 67] {
        engine.apply(EngineCommand::NoteOff { pitch, target: Target::All }, MS * 20, &mut out);
    }
    run(&mut engine, 20, 1600, &mut out);
    let before = out.len();

    hold(&mut engine, &[72], MS * 1700, &mut out);
    run(&mut engine, 1700, 2600, &mut out);
    assert_eq!(note_ons(&out[before..], id(0)), vec![72, 72]);
    assert_eq!(engine.instance(id(0)).unwrap().snapshot().sorted_pitches(), vec![72]);
    assert!(engine.instance(id(0)).unwrap().is_latched());
    assert_balanced(&out);
}

#[test]
fn tempo_change_does_not_move_a_scheduled_note_off() {
    let mut engine = engine(1);
    let mut out = Vec::new();
    hold(&mut engine, &[60, 64], Duration::ZERO, &mut out);
    run(&mut engine, 0, 100, &mut out);
    engine.apply(EngineCommand::SetTempo { instance: id(0), bpm: 30 }, MS * 100, &mut out);
    run(&mut engine, 100, 2600, &mut out);

    let first_off = out.iter().find(|e| e.is_note_off).unwrap();
    assert_eq!(first_off.timestamp, MS * 400);
    let ons: Vec<Duration> = out.iter().filter(|e| e.is_note_on()).map(|e| e.timestamp).collect();
    // Old interval until the boundary at 500, then two seconds per step.
    assert_eq!(ons, vec![Duration::ZERO, MS * 500, MS * 2500]);
}

#[test]
fn releasing_keys_mid_note_still_ends_the_note() {
    let mut engine = engine(1);
    let mut out = Vec::new();
    hold(&mut engine, &[60, 64, 67], Duration::ZERO, &mut out);
    run(&mut engine, 0, 600, &mut out);
    engine.apply(EngineCommand::Clear { target: Target::All }, MS * 600, &mut out);
    run(&mut engine, 600, 3000, &mut out);

    assert_eq!(note_ons(&out, id(0)), vec![60, 64]);
    let last = out.last().unwrap();
    assert!(last.is_note_off);
    assert_eq!(last.pitch(), 64);
    assert_eq!(last.timestamp, MS * 900);
    assert_balanced(&out);
}

#[test]
fn notes_change_between_steps_without_stuck_notes() {
    let mut engine = engine(2);
    let mut out = Vec::new();
    engine.set_mode(id(1), PatternMode::Random);
    hold(&mut engine, &[48, 55, 60], Duration::ZERO, &mut out);
    for (t, pitch, on) in [(130, 64, true), (700, 48, false), (1210, 72, true), (1800, 55, false)] {
        let cmd = if on {
            EngineCommand::NoteOn { pitch, velocity: 70, target: Target::All }
        } else {
            EngineCommand::NoteOff { pitch, target: Target::All }
        };
        engine.apply(cmd, MS * t, &mut out);
        run(&mut engine, t as u64, t as u64 + 300, &mut out);
    }
    engine.apply(EngineCommand::Stop { target: Target::All }, MS * 2500, &mut out);
    assert_balanced(&out);
    assert_time_ordered(&out);
    let ons = out.iter().filter(|e| e.is_note_on()).count();
    let offs = out.iter().filter(|e| e.is_note_off).count();
    assert_eq!(ons, offs);
}

#[test]
fn stop_flushes_pending_note_offs_immediately() {
    let mut engine = engine(1);
    let mut out = Vec::new();
    hold(&mut engine, &[60], Duration::ZERO, &mut out);
    run(&mut engine, 0, 50, &mut out);
    engine.apply(EngineCommand::Stop { target: Target::All }, MS * 51, &mut out);

    assert_eq!(out.len(), 2);
    assert!(out[1].is_note_off);
    assert_eq!(out[1].timestamp, MS * 51);
    run(&mut engine, 51, 2000, &mut out);
    assert_eq!(out.len(), 2);
}

#[test]
fn rerouting_only_affects_new_notes() {
    let mut engine = engine(1);
    let mut out = Vec::new();
    hold(&mut engine, &[60, 64], Duration::ZERO, &mut out);
    run(&mut engine, 0, 100, &mut out);
    engine.apply(
        EngineCommand::SetRouting { instance: id(0), channel: 9, device: DeviceId::new(2) },
        MS * 100,
        &mut out,
    );
    run(&mut engine, 100, 600, &mut out);

    let routed = Route::new(9, DeviceId::new(2));
    assert_eq!(out[0].route, Route::default());
    assert!(out[1].is_note_off);
    assert_eq!(out[1].route, Route::default());
    assert!(out[2].is_note_on());
    assert_eq!(out[2].route, routed);
}

#[test]
fn idle_instance_keeps_its_cursor() {
    let mut engine = engine(1);
    let mut out = Vec::new();
    hold(&mut engine, &[60, 64, 67], Duration::ZERO, &mut out);
    run(&mut engine, 0, 10, &mut out);
    for pitch in [60, 64, 67] {
        engine.apply(EngineCommand::NoteOff { pitch, target: Target::All }, MS * 10, &mut out);
    }
    run(&mut engine, 10, 5000, &mut out);
    assert_eq!(engine.instance(id(0)).unwrap().cursor(), 1);

    hold(&mut engine, &[60, 64, 67], MS * 5000, &mut out);
    run(&mut engine, 5000, 5010, &mut out);
    assert_eq!(note_ons(&out, id(0)), vec![60, 64]);
}

#[test]
fn late_ticks_are_dropped_not_replayed() {
    let mut engine = engine(1);
    let mut out = Vec::new();
    hold(&mut engine, &[60, 64, 67], Duration::ZERO, &mut out);
    engine.tick(Duration::ZERO, &mut out);
    let report = engine.tick(MS * 2100, &mut out);

    assert_eq!(report.dropped, 3);
    assert_eq!(note_ons(&out, id(0)), vec![60, 64]);
    assert_eq!(engine.take_telemetry_summary().dropped_steps, 3);
}

#[test]
fn fastest_rate_steps_every_seven_and_a_half_milliseconds() {
    let mut engine = engine(1);
    let mut out = Vec::new();
    engine.set_tempo(id(0), 999);
    engine.set_rate(id(0), arpy_types::StepRate::ThirtySecond);
    hold(&mut engine, &[60, 62], Duration::ZERO, &mut out);
    run(&mut engine, 0, 100, &mut out);

    // 60000 / 999 / 8 ms per step: fourteen steps in the first 100 ms.
    assert_eq!(note_ons(&out, id(0)).len(), 14);
    assert_balanced(&out);
}

#[test]
fn emitted_notes_stay_in_midi_range() {
    let mut engine = engine(1);
    let mut out = Vec::new();
    engine.set_mode(id(0), PatternMode::OctaveSpread);
    engine.set_octave_spread(id(0), 4);
    engine.set_root_offset(id(0), 12);
    hold(&mut engine, &[100, 120, 127], Duration::ZERO, &mut out);
    run(&mut engine, 0, 5000, &mut out);
    assert!(!out.is_empty());
    assert!(out.iter().all(|e| e.pitch() <= 127 && e.velocity() <= 127));
}
