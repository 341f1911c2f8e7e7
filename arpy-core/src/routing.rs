//! Instance -> (MIDI channel, device) lookup.
//!
//! A `RoutingTable` is immutable once built. Updates produce a new table which
//! the engine publishes by swapping an `Arc`, so readers holding the previous
//! table are never disturbed and no lock is needed.

use std::collections::HashMap;
use std::sync::Arc;

use arpy_types::{DeviceId, InstanceId, Route};

use crate::error::EngineError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingTable {
    routes: HashMap<InstanceId, Route>,
    fallback: Route,
}

impl RoutingTable {
    pub fn new(fallback: Route) -> Self {
        Self {
            routes: HashMap::new(),
            fallback,
        }
    }

    pub fn fallback(&self) -> Route {
        self.fallback
    }

    /// Explicitly configured route, if any.
    pub fn get(&self, id: InstanceId) -> Option<Route> {
        self.routes.get(&id).copied()
    }

    /// Destination for `id`, falling back to the default when unset.
    pub fn resolve(&self, id: InstanceId) -> Route {
        match self.routes.get(&id) {
            Some(route) => *route,
            None => {
                log::trace!(target: "arpy::routing", "{}", EngineError::RoutingMiss(id));
                self.fallback
            }
        }
    }

    /// New table with `id` routed to `channel` on `device`.
    pub fn with_route(&self, id: InstanceId, channel: u8, device: DeviceId) -> RoutingTable {
        if channel > arpy_types::MAX_CHANNEL {
            log::debug!(
                target: "arpy::routing",
                "{}",
                EngineError::clamped("channel", channel, arpy_types::MAX_CHANNEL)
            );
        }
        let mut next = self.clone();
        next.routes.insert(id, Route::new(channel, device));
        next
    }
}

/// Shared, atomically replaced routing table.
pub type SharedRouting = Arc<RoutingTable>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_instances_use_the_fallback() {
        let table = RoutingTable::new(Route::new(9, DeviceId::new(2)));
        assert_eq!(table.resolve(InstanceId::new(4)), Route::new(9, DeviceId::new(2)));
        assert_eq!(table.get(InstanceId::new(4)), None);
    }

    #[test]
    fn with_route_leaves_the_original_untouched() {
        let table = RoutingTable::default();
        let next = table.with_route(InstanceId::new(1), 3, DeviceId::new(1));
        assert_eq!(next.resolve(InstanceId::new(1)), Route::new(3, DeviceId::new(1)));
        assert_eq!(table.resolve(InstanceId::new(1)), Route::default());
    }

    #[test]
    fn channel_is_clamped() {
        let table = RoutingTable::default().with_route(InstanceId::new(0), 40, DeviceId::default());
        assert_eq!(table.resolve(InstanceId::new(0)).channel, 15);
    }
}
