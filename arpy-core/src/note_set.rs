//! Held-note bookkeeping for one arpeggiator instance.
//!
//! Notes are keyed by pitch and kept in order of press. While latched, key
//! releases are only recorded; the note stays in the set until an explicit
//! clear. Once every latched key has been released, the next press rearms the
//! latch: the sustained chord is dropped and the new press starts a fresh one.

/// A note currently held (or sustained by latch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeldNote {
    pub pitch: u8,
    pub velocity: u8,
}

#[derive(Debug, Clone, Default)]
pub struct NoteSet {
    /// Press order. No two entries share a pitch.
    notes: Vec<HeldNote>,
    latched: bool,
    /// Pitches whose physical key went up while latched.
    released: Vec<u8>,
}

impl NoteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pitch, or update its velocity if already held (position kept).
    /// Returns true if the pitch was not held before.
    pub fn note_on(&mut self, pitch: u8, velocity: u8) -> bool {
        if self.latched && self.all_released() {
            self.notes.clear();
            self.released.clear();
        }
        self.released.retain(|&p| p != pitch);
        match self.notes.iter_mut().find(|n| n.pitch == pitch) {
            Some(existing) => {
                existing.velocity = velocity;
                false
            }
            None => {
                self.notes.push(HeldNote { pitch, velocity });
                true
            }
        }
    }

    /// Remove a pitch. While latched the set is untouched and the release is
    /// only recorded. Returns true if the pitch was removed.
    pub fn note_off(&mut self, pitch: u8) -> bool {
        if self.latched {
            if self.contains(pitch) && !self.released.contains(&pitch) {
                self.released.push(pitch);
            }
            return false;
        }
        let before = self.notes.len();
        self.notes.retain(|n| n.pitch != pitch);
        self.notes.len() != before
    }

    /// Toggle latch. Whatever is held at toggle time stays in the set either way.
    pub fn set_latched(&mut self, latched: bool) {
        self.latched = latched;
        if !latched {
            self.released.clear();
        }
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }

    /// Every sustained note has had its key released.
    fn all_released(&self) -> bool {
        !self.notes.is_empty() && self.notes.iter().all(|n| self.released.contains(&n.pitch))
    }

    /// Drop everything, latched or not.
    pub fn clear(&mut self) {
        self.notes.clear();
        self.released.clear();
    }

    pub fn contains(&self, pitch: u8) -> bool {
        self.notes.iter().any(|n| n.pitch == pitch)
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Copy of the current contents for pattern generation.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            notes: self.notes.clone(),
        }
    }

    /// Remove duplicate pitches, keeping the first press.
    pub(crate) fn dedup(&mut self) {
        let mut seen = [false; 128];
        self.notes.retain(|n| {
            let slot = &mut seen[(n.pitch & 0x7F) as usize];
            let keep = !*slot;
            *slot = true;
            keep
        });
    }

    /// Append without the unique-pitch check, to reproduce a corrupted set.
    #[cfg(test)]
    pub(crate) fn push_unchecked(&mut self, pitch: u8, velocity: u8) {
        self.notes.push(HeldNote { pitch, velocity });
    }
}

/// Immutable copy of a [`NoteSet`], in press order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    notes: Vec<HeldNote>,
}

impl Snapshot {
    /// Pitches in press order.
    pub fn pitches(&self) -> Vec<u8> {
        self.notes.iter().map(|n| n.pitch).collect()
    }

    /// Pitches sorted ascending.
    pub fn sorted_pitches(&self) -> Vec<u8> {
        let mut pitches = self.pitches();
        pitches.sort_unstable();
        pitches
    }

    pub fn velocity_of(&self, pitch: u8) -> Option<u8> {
        self.notes.iter().find(|n| n.pitch == pitch).map(|n| n.velocity)
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }
}
