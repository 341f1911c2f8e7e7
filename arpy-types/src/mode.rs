use serde::{Deserialize, Serialize};

/// Pattern (emanator) bound to an arpeggiator instance.
///
/// The variant set is closed; each variant names a pure ordering over a
/// snapshot of the held notes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternMode {
    #[default]
    Up,
    Down,
    UpDown,
    DownUp,
    Random,
    Flow,
    ConvergeUp,
    ConvergeDown,
    ExpandUp,
    ExpandDown,
    LowAlternateUp,
    LowAlternateDown,
    HighAlternateUp,
    HighAlternateDown,
    ChordStrum,
    OctaveSpread,
}

impl PatternMode {
    pub const ALL: [PatternMode; 16] = [
        PatternMode::Up,
        PatternMode::Down,
        PatternMode::UpDown,
        PatternMode::DownUp,
        PatternMode::Random,
        PatternMode::Flow,
        PatternMode::ConvergeUp,
        PatternMode::ConvergeDown,
        PatternMode::ExpandUp,
        PatternMode::ExpandDown,
        PatternMode::LowAlternateUp,
        PatternMode::LowAlternateDown,
        PatternMode::HighAlternateUp,
        PatternMode::HighAlternateDown,
        PatternMode::ChordStrum,
        PatternMode::OctaveSpread,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PatternMode::Up => "Up",
            PatternMode::Down => "Down",
            PatternMode::UpDown => "Up/Down",
            PatternMode::DownUp => "Down/Up",
            PatternMode::Random => "Random",
            PatternMode::Flow => "Flow",
            PatternMode::ConvergeUp => "Converge Up",
            PatternMode::ConvergeDown => "Converge Down",
            PatternMode::ExpandUp => "Expand Up",
            PatternMode::ExpandDown => "Expand Down",
            PatternMode::LowAlternateUp => "Low Alt Up",
            PatternMode::LowAlternateDown => "Low Alt Down",
            PatternMode::HighAlternateUp => "High Alt Up",
            PatternMode::HighAlternateDown => "High Alt Down",
            PatternMode::ChordStrum => "Strum",
            PatternMode::OctaveSpread => "Octaves",
        }
    }

    /// Parse a mode from a config or console token.
    ///
    /// Case and separators are ignored, so `up-down`, `UpDown` and `up_down`
    /// all resolve to [`PatternMode::UpDown`].
    pub fn from_name(s: &str) -> Option<PatternMode> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        let mode = match key.as_str() {
            "up" => PatternMode::Up,
            "down" => PatternMode::Down,
            "updown" => PatternMode::UpDown,
            "downup" => PatternMode::DownUp,
            "random" => PatternMode::Random,
            "flow" => PatternMode::Flow,
            "convergeup" => PatternMode::ConvergeUp,
            "convergedown" => PatternMode::ConvergeDown,
            "expandup" => PatternMode::ExpandUp,
            "expanddown" => PatternMode::ExpandDown,
            "lowalternateup" | "lowaltup" => PatternMode::LowAlternateUp,
            "lowalternatedown" | "lowaltdown" => PatternMode::LowAlternateDown,
            "highalternateup" | "highaltup" => PatternMode::HighAlternateUp,
            "highalternatedown" | "highaltdown" => PatternMode::HighAlternateDown,
            "chordstrum" | "strum" => PatternMode::ChordStrum,
            "octavespread" | "octaves" => PatternMode::OctaveSpread,
            _ => return None,
        };
        Some(mode)
    }

    /// Whether one step emits a batch of notes rather than a single note.
    pub fn is_batch(&self) -> bool {
        matches!(self, PatternMode::ChordStrum)
    }

    pub fn next(&self) -> PatternMode {
        let idx = self.position();
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> PatternMode {
        let idx = self.position();
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    fn position(&self) -> usize {
        Self::ALL.iter().position(|m| m == self).unwrap_or(0)
    }
}

/// Step subdivision of a beat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepRate {
    #[default]
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
}

impl StepRate {
    pub fn name(&self) -> &'static str {
        match self {
            StepRate::Quarter => "1/4",
            StepRate::Eighth => "1/8",
            StepRate::Sixteenth => "1/16",
            StepRate::ThirtySecond => "1/32",
        }
    }

    pub fn from_name(s: &str) -> Option<StepRate> {
        match s.trim() {
            "1/4" | "4" | "quarter" => Some(StepRate::Quarter),
            "1/8" | "8" | "eighth" => Some(StepRate::Eighth),
            "1/16" | "16" | "sixteenth" => Some(StepRate::Sixteenth),
            "1/32" | "32" | "thirtysecond" => Some(StepRate::ThirtySecond),
            _ => None,
        }
    }

    /// Steps per beat (quarter note)
    pub fn steps_per_beat(&self) -> u32 {
        match self {
            StepRate::Quarter => 1,
            StepRate::Eighth => 2,
            StepRate::Sixteenth => 4,
            StepRate::ThirtySecond => 8,
        }
    }

    pub fn next(&self) -> StepRate {
        match self {
            StepRate::Quarter => StepRate::Eighth,
            StepRate::Eighth => StepRate::Sixteenth,
            StepRate::Sixteenth => StepRate::ThirtySecond,
            StepRate::ThirtySecond => StepRate::Quarter,
        }
    }

    pub fn prev(&self) -> StepRate {
        match self {
            StepRate::Quarter => StepRate::ThirtySecond,
            StepRate::Eighth => StepRate::Quarter,
            StepRate::Sixteenth => StepRate::Eighth,
            StepRate::ThirtySecond => StepRate::Sixteenth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_mode_next_cycle() {
        let mut mode = PatternMode::Up;
        for _ in 0..PatternMode::ALL.len() {
            mode = mode.next();
        }
        assert_eq!(mode, PatternMode::Up);
    }

    #[test]
    fn pattern_mode_prev_cycle() {
        let mut mode = PatternMode::Up;
        for _ in 0..PatternMode::ALL.len() {
            mode = mode.prev();
        }
        assert_eq!(mode, PatternMode::Up);
        assert_eq!(PatternMode::Up.prev(), PatternMode::OctaveSpread);
    }

    #[test]
    fn pattern_mode_from_name_ignores_case_and_separators() {
        assert_eq!(PatternMode::from_name("up-down"), Some(PatternMode::UpDown));
        assert_eq!(PatternMode::from_name("ConvergeDown"), Some(PatternMode::ConvergeDown));
        assert_eq!(PatternMode::from_name("low_alt_up"), Some(PatternMode::LowAlternateUp));
        assert_eq!(PatternMode::from_name("strum"), Some(PatternMode::ChordStrum));
        assert_eq!(PatternMode::from_name("sideways"), None);
    }

    #[test]
    fn every_mode_round_trips_through_debug_name() {
        for mode in PatternMode::ALL {
            let token = format!("{:?}", mode);
            assert_eq!(PatternMode::from_name(&token), Some(mode));
        }
    }

    #[test]
    fn step_rate_steps_per_beat() {
        assert_eq!(StepRate::Quarter.steps_per_beat(), 1);
        assert_eq!(StepRate::Eighth.steps_per_beat(), 2);
        assert_eq!(StepRate::Sixteenth.steps_per_beat(), 4);
        assert_eq!(StepRate::ThirtySecond.steps_per_beat(), 8);
    }

    #[test]
    fn step_rate_next_prev_cycle() {
        let mut rate = StepRate::Quarter;
        for _ in 0..4 {
            rate = rate.next();
        }
        assert_eq!(rate, StepRate::Quarter);

        for _ in 0..4 {
            rate = rate.prev();
        }
        assert_eq!(rate, StepRate::Quarter);
    }
}
