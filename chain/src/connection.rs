// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::collections::BTreeMap;
use std::fmt::Display;

/// Opaque identifier of a connection, stable for its whole lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Build an id from a string
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self(id.to_owned())
    }
    /// The id, as a string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
    /// Tell if the id is empty. Empty ids are rejected by chains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A way to attach a connection to an endpoint (e.g. a shared-memory interface), with
/// its parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mechanism {
    /// mechanism type, e.g. `MEMIF`
    pub kind: String,
    /// free-form parameters
    pub parameters: BTreeMap<String, String>,
}

impl Mechanism {
    /// A mechanism of the given type, without parameters
    #[must_use]
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_owned(),
            parameters: BTreeMap::new(),
        }
    }
}

/// A logical connection through the mesh
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Connection {
    /// connection id
    pub id: ConnectionId,
    /// name of the network service the connection is for
    pub network_service: String,
    /// labels of the connection
    pub labels: BTreeMap<String, String>,
    /// mechanism selected for the connection, once negotiated
    pub mechanism: Option<Mechanism>,
}

impl Connection {
    /// A connection to the given network service, without labels nor mechanism
    #[must_use]
    pub fn new(id: &str, network_service: &str) -> Self {
        Self {
            id: ConnectionId::new(id),
            network_service: network_service.to_owned(),
            ..Self::default()
        }
    }
}

/// A request to establish (or refresh) a connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkServiceRequest {
    /// the connection requested
    pub connection: Connection,
    /// mechanisms acceptable to the requester, by order of preference
    pub mechanism_preferences: Vec<Mechanism>,
}

impl NetworkServiceRequest {
    /// A request for the given connection, with the given preferred mechanisms
    #[must_use]
    pub fn new(connection: Connection, mechanism_preferences: Vec<Mechanism>) -> Self {
        Self {
            connection,
            mechanism_preferences,
        }
    }
}
