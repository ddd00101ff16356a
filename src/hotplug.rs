use std::{collections::BTreeSet, time::Duration};

use tracing::{error, info};

use crate::{
    connection::{Connection, ID_REQUEST},
    events::{Event, Events},
    registry::Registry,
    serial::SerialOpener,
};

/// How long to let a freshly opened port settle before talking to it.
const WARMUP_DELAY: Duration = Duration::from_millis(500);

/// The pause around the input clear between the two identification sends.
const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Diffs the scanned device paths against the paths opened so far and
/// opens or tears down connections accordingly.
///
/// Only ever invoked from the router's loop, so two passes never overlap.
pub struct Reconciler {
    opener: Box<dyn SerialOpener>,
    baud: u32,
    known_paths: BTreeSet<String>,
}

impl Reconciler {
    /// A reconciler that has seen no paths yet. The first pass will
    /// open everything currently plugged in.
    pub fn new(opener: Box<dyn SerialOpener>, baud: u32) -> Self {
        Self {
            opener,
            baud,
            known_paths: BTreeSet::new(),
        }
    }

    /// One reconciliation pass against the given scan result.
    pub async fn reconcile(
        &mut self,
        current: BTreeSet<String>,
        registry: &mut Registry,
        events: &mut Events,
    ) {
        let added: Vec<_> = current.difference(&self.known_paths).cloned().collect();
        let removed: Vec<_> = self.known_paths.difference(&current).cloned().collect();

        let mut known = current;

        for path in added {
            // A path whose open failed stays unknown, so the next pass
            // tries it again.
            if !self.connect(&path, registry, events).await {
                known.remove(&path);
            }
        }

        for path in removed {
            Self::remove(&path, registry, events);
        }

        self.known_paths = known;
    }

    async fn connect(&self, path: &str, registry: &mut Registry, events: &mut Events) -> bool {
        info!(%path, "connecting");

        let link = match self.opener.open(path, self.baud) {
            Ok(link) => link,
            Err(e) => {
                error!(%e, "open error");
                events.publish(Event::Error("couldn't open port".to_string()));
                return false;
            }
        };

        events.publish(Event::Device(path.to_string()));

        let mut connection = Connection::new(path, link);

        // Some boards silently drop the very first write after a fresh
        // open. Let the port settle, then send the identification
        // request twice with a clear in between.
        tokio::time::sleep(WARMUP_DELAY).await;
        if let Err(e) = connection.write(ID_REQUEST) {
            error!(%e, "identification request failed");
        }
        tokio::time::sleep(SETTLE_DELAY).await;
        connection.clear();
        tokio::time::sleep(SETTLE_DELAY).await;
        if let Err(e) = connection.write(ID_REQUEST) {
            error!(%e, "identification request failed");
        }

        registry.add(connection);
        true
    }

    fn remove(path: &str, registry: &mut Registry, events: &mut Events) {
        let Some(mut connection) = registry.remove_by_path(path) else {
            return;
        };

        info!(%connection, "removed");
        events.publish(Event::Removed(path.to_string()));
        connection.close();
    }
}
