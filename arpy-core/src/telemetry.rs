//! Clock-thread telemetry: tick cost, overruns and dropped steps.
//!
//! Tick durations go into a fixed-size ring buffer, so recording never
//! allocates on the engine thread.

use std::time::Duration;

use crate::clock::TickReport;

/// Ring buffer size for tick duration samples.
const TICK_BUFFER_SIZE: usize = 256;

/// Snapshot of clock performance, produced by [`ClockTelemetry::take_summary`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetrySummary {
    /// Mean tick duration over the buffered samples, in microseconds.
    pub avg_tick_us: u32,
    /// Longest tick since the previous summary, in microseconds.
    pub max_tick_us: u32,
    /// 95th percentile tick duration over the buffered samples, in microseconds.
    pub p95_tick_us: u32,
    /// Ticks that took longer than their budget (cumulative).
    pub overruns: u64,
    /// Steps dropped because the clock fell behind (cumulative).
    pub dropped_steps: u64,
    /// Note events emitted since the previous summary.
    pub events: u64,
}

/// Telemetry collector owned by the engine.
///
/// The engine thread records one sample per tick; clock reports add dropped
/// steps and emitted events.
pub struct ClockTelemetry {
    /// Ring buffer of tick durations in microseconds
    tick_durations_us: [u32; TICK_BUFFER_SIZE],
    /// Current write index in the ring buffer
    tick_idx: usize,
    /// Number of samples collected (saturates at TICK_BUFFER_SIZE)
    sample_count: usize,
    /// Maximum tick duration observed in the current window
    max_tick_us: u32,
    /// Ticks that exceeded their budget
    overrun_count: u64,
    /// Steps skipped because a tick arrived late
    dropped_steps: u64,
    /// Note-ons plus note-offs in the current window
    events: u64,
}

impl Default for ClockTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockTelemetry {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self {
            tick_durations_us: [0; TICK_BUFFER_SIZE],
            tick_idx: 0,
            sample_count: 0,
            max_tick_us: 0,
            overrun_count: 0,
            dropped_steps: 0,
            events: 0,
        }
    }

    /// Record how long one tick took. Call once per engine-thread tick.
    ///
    /// # Arguments
    /// * `duration` - Time taken by the tick
    /// * `budget_us` - Target budget in microseconds (the tick interval)
    #[inline]
    pub fn record(&mut self, duration: Duration, budget_us: u32) {
        let us = duration.as_micros().min(u32::MAX as u128) as u32;

        self.tick_durations_us[self.tick_idx] = us;
        self.tick_idx = (self.tick_idx + 1) % TICK_BUFFER_SIZE;
        if self.sample_count < TICK_BUFFER_SIZE {
            self.sample_count += 1;
        }
        self.max_tick_us = self.max_tick_us.max(us);
        if us > budget_us {
            self.overrun_count += 1;
        }
    }

    /// Fold what a clock tick did into the counters.
    #[inline]
    pub fn record_report(&mut self, report: &TickReport) {
        self.dropped_steps += report.dropped;
        self.events += (report.note_ons + report.note_offs) as u64;
    }

    /// Summarise the current window. Resets the max and the event count;
    /// overruns and dropped steps stay cumulative.
    pub fn take_summary(&mut self) -> TelemetrySummary {
        let events = std::mem::take(&mut self.events);
        if self.sample_count == 0 {
            return TelemetrySummary {
                overruns: self.overrun_count,
                dropped_steps: self.dropped_steps,
                events,
                ..TelemetrySummary::default()
            };
        }

        let samples = &self.tick_durations_us[..self.sample_count];
        let sum: u64 = samples.iter().map(|&x| x as u64).sum();
        let avg = (sum / self.sample_count as u64) as u32;

        let mut sorted = self.tick_durations_us;
        sorted[..self.sample_count].sort_unstable();
        let p95_idx = (self.sample_count * 95 / 100).max(1) - 1;

        let summary = TelemetrySummary {
            avg_tick_us: avg,
            max_tick_us: self.max_tick_us,
            p95_tick_us: sorted[p95_idx.min(self.sample_count - 1)],
            overruns: self.overrun_count,
            dropped_steps: self.dropped_steps,
            events,
        };
        self.max_tick_us = 0;
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_averages_samples() {
        let mut t = ClockTelemetry::new();
        t.record(Duration::from_micros(100), 500);
        t.record(Duration::from_micros(200), 500);
        t.record(Duration::from_micros(300), 500);

        let s = t.take_summary();
        assert_eq!(s.avg_tick_us, 200);
        assert_eq!(s.max_tick_us, 300);
        assert_eq!(s.overruns, 0);
        assert_eq!(t.take_summary().max_tick_us, 0);
    }

    #[test]
    fn overruns_are_counted() {
        let mut t = ClockTelemetry::new();
        t.record(Duration::from_micros(400), 500);
        t.record(Duration::from_micros(600), 500);
        t.record(Duration::from_micros(800), 500);
        assert_eq!(t.take_summary().overruns, 2);
    }

    #[test]
    fn dropped_steps_accumulate_across_windows() {
        let mut t = ClockTelemetry::new();
        t.record_report(&TickReport { dropped: 2, note_ons: 1, ..TickReport::default() });
        assert_eq!(t.take_summary().events, 1);
        t.record_report(&TickReport { dropped: 1, ..TickReport::default() });
        let s = t.take_summary();
        assert_eq!(s.dropped_steps, 3);
        assert_eq!(s.events, 0);
    }
}
