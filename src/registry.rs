use std::collections::BTreeSet;

use tracing::debug;

use crate::connection::Connection;

/// The live set of connections, in open order.
///
/// Owned by the router; the hotplug reconciler adds and removes
/// entries, nothing else does. Open order only matters for the
/// "first available" default when a send names no target.
#[derive(Default)]
pub struct Registry {
    connections: Vec<Connection>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. The reconciler guarantees at most one
    /// connection per path ever exists.
    pub fn add(&mut self, connection: Connection) {
        debug!(path = %connection.path(), "Adding connection");
        self.connections.push(connection);
    }

    /// Take the connection at the given path out of every lookup path.
    /// The caller is responsible for closing it.
    pub fn remove_by_path(&mut self, path: &str) -> Option<Connection> {
        let index = self
            .connections
            .iter()
            .position(|c| c.matches_path(path))?;

        Some(self.connections.remove(index))
    }

    /// The connection whose device reported this identity.
    /// First match wins if two devices claim the same name.
    pub fn find_by_id_mut(&mut self, id: &str) -> Option<&mut Connection> {
        self.connections.iter_mut().find(|c| c.matches_id(id))
    }

    /// The connection on this device node path.
    pub fn find_by_path_mut(&mut self, path: &str) -> Option<&mut Connection> {
        self.connections.iter_mut().find(|c| c.matches_path(path))
    }

    /// The oldest live connection, the default send target.
    pub fn first_mut(&mut self) -> Option<&mut Connection> {
        self.connections.first_mut()
    }

    /// Whether any connection exists.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// How many connections exist.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Iterate over the connections, in open order.
    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    /// Iterate mutably, in open order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Connection> {
        self.connections.iter_mut()
    }

    /// The device node paths currently connected.
    pub fn paths(&self) -> BTreeSet<String> {
        self.connections
            .iter()
            .map(|c| c.path().to_string())
            .collect()
    }

    /// Close every connection. Used on shutdown.
    pub fn close_all(&mut self) {
        for connection in &mut self.connections {
            connection.close();
        }
        self.connections.clear();
    }
}
