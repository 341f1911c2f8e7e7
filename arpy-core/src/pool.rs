//! A fixed-size set of arpeggiator instances addressed by id.

use arpy_types::{InstanceId, InstancePreset, Target};

use crate::error::{EngineError, EngineResult};
use crate::instance::{ArpeggiatorInstance, Transition};

pub const MIN_POOL_SIZE: usize = 1;
pub const MAX_POOL_SIZE: usize = 16;

#[derive(Debug, Clone)]
pub struct InstancePool {
    instances: Vec<ArpeggiatorInstance>,
}

impl InstancePool {
    /// Build `size` instances (ids `0..size`) from `defaults`. Each instance
    /// seeds its random source with `seed + id`, so runs are reproducible
    /// and instances do not mirror each other in `Random`/`Flow`.
    pub fn new(size: usize, defaults: &InstancePreset, seed: u64) -> EngineResult<Self> {
        if !(MIN_POOL_SIZE..=MAX_POOL_SIZE).contains(&size) {
            return Err(EngineError::InvalidPoolSize {
                requested: size,
                max: MAX_POOL_SIZE,
            });
        }
        let instances = (0..size as u32)
            .map(|i| ArpeggiatorInstance::new(InstanceId::new(i), defaults, seed.wrapping_add(i as u64)))
            .collect();
        Ok(Self { instances })
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        id.index() < self.instances.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.instances.iter().map(|i| i.id())
    }

    pub fn get(&self, id: InstanceId) -> Option<&ArpeggiatorInstance> {
        self.instances.get(id.index())
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut ArpeggiatorInstance> {
        self.instances.get_mut(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArpeggiatorInstance> {
        self.instances.iter()
    }

    /// Run `change` on every targeted instance, in id order, collecting the
    /// state transitions it causes. Unknown ids are logged and skipped.
    pub fn for_each_target(
        &mut self,
        target: &Target,
        mut change: impl FnMut(&mut ArpeggiatorInstance) -> Option<Transition>,
    ) -> Vec<Transition> {
        if let Target::Only(ids) = target {
            for &id in ids.iter().filter(|id| !self.contains(**id)) {
                log::warn!(target: "arpy::pool", "{}", EngineError::UnknownInstance(id));
            }
        }
        self.instances
            .iter_mut()
            .filter(|instance| target.includes(instance.id()))
            .filter_map(&mut change)
            .collect()
    }

    pub fn note_on(&mut self, pitch: u8, velocity: u8, target: &Target) -> Vec<Transition> {
        self.for_each_target(target, |i| i.note_on(pitch, velocity))
    }

    pub fn note_off(&mut self, pitch: u8, target: &Target) -> Vec<Transition> {
        self.for_each_target(target, |i| i.note_off(pitch))
    }

    pub fn clear(&mut self, target: &Target) -> Vec<Transition> {
        self.for_each_target(target, ArpeggiatorInstance::clear)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::InstanceState;

    fn pool(size: usize) -> InstancePool {
        InstancePool::new(size, &InstancePreset::default(), 0).unwrap()
    }

    #[test]
    fn size_must_be_between_one_and_sixteen() {
        assert!(InstancePool::new(0, &InstancePreset::default(), 0).is_err());
        assert!(InstancePool::new(17, &InstancePreset::default(), 0).is_err());
        assert_eq!(pool(16).len(), 16);
        assert_eq!(pool(1).len(), 1);
    }

    #[test]
    fn ids_are_dense_and_ordered() {
        let ids: Vec<u32> = pool(4).ids().map(InstanceId::get).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn broadcast_reaches_every_instance() {
        let mut pool = pool(3);
        let transitions = pool.note_on(60, 100, &Target::All);
        assert_eq!(transitions.len(), 3);
        assert!(pool.iter().all(|i| i.state() == InstanceState::Running));
    }

    #[test]
    fn subset_target_leaves_others_alone() {
        let mut pool = pool(4);
        pool.note_on(60, 100, &Target::Only(vec![InstanceId::new(2), InstanceId::new(0)]));
        let running: Vec<bool> = pool.iter().map(|i| !i.is_idle()).collect();
        assert_eq!(running, vec![true, false, true, false]);
    }

    #[test]
    fn unknown_ids_are_skipped() {
        let mut pool = pool(2);
        let transitions = pool.note_on(60, 100, &Target::Only(vec![InstanceId::new(9), InstanceId::new(1)]));
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].id, InstanceId::new(1));
    }

    #[test]
    fn repeated_ids_are_changed_once() {
        let mut pool = pool(2);
        let target = Target::Only(vec![InstanceId::new(1), InstanceId::new(1)]);
        assert_eq!(pool.note_on(60, 100, &target).len(), 1);
    }

    #[test]
    fn note_off_reports_stops() {
        let mut pool = pool(2);
        pool.note_on(60, 100, &Target::All);
        let transitions = pool.note_off(60, &Target::All);
        assert!(transitions.iter().all(Transition::stopped));
        assert_eq!(transitions.len(), 2);
    }
}
