// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use chain::ConnectionId;
use dashmap::DashMap;

/// The connections a NAT stage has configured. An entry is only added once the dataplane
/// accepted the whole configuration of the connection, and removed on close.
#[derive(Debug, Default)]
pub struct ConfiguredConnections(DashMap<ConnectionId, bool>);

impl ConfiguredConnections {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tell if the connection was configured
    #[must_use]
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.0.contains_key(id)
    }

    /// The marker stored for a connection, if any
    #[must_use]
    pub fn get(&self, id: &ConnectionId) -> Option<bool> {
        self.0.get(id).map(|v| *v)
    }

    /// Record a connection as configured. Concurrent first requests for the same connection
    /// may both get here: the last one wins.
    pub fn mark(&self, id: &ConnectionId) {
        self.0.insert(id.clone(), true);
    }

    /// Forget a connection, telling if it was configured
    pub fn remove(&self, id: &ConnectionId) -> bool {
        self.0.remove(id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
