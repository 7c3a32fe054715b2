use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{
    ConnectionId, ConnectionSnapshot, DeviceCapabilities, Endpoint, OpenTimeouts, ReadyState, RegistryError, Result,
};
use crate::ports::Connection;

/// A connection owned by the registry
pub struct ConnectionRecord {
    pub id: ConnectionId,
    pub endpoint: Endpoint,
    pub state: ReadyState,
    pub capabilities: DeviceCapabilities,
    pub timeouts: OpenTimeouts,
    pub observers: Vec<String>,
    pub connection: Arc<dyn Connection>,
    pub last_activity: Instant,
    pub heartbeat: Option<JoinHandle<()>>,
}

impl ConnectionRecord {
    pub fn new(
        id: ConnectionId,
        endpoint: Endpoint,
        capabilities: DeviceCapabilities,
        timeouts: OpenTimeouts,
        connection: Arc<dyn Connection>,
    ) -> Self {
        Self {
            id,
            endpoint,
            state: ReadyState::Connecting,
            capabilities,
            timeouts,
            observers: Vec::new(),
            connection,
            last_activity: Instant::now(),
            heartbeat: None,
        }
    }

    pub fn attach_observer(&mut self, name: &str) {
        if !self.observers.iter().any(|o| o == name) {
            self.observers.push(name.to_string());
        }
    }

    pub fn stop_heartbeat(&mut self) {
        if let Some(task) = self.heartbeat.take() {
            task.abort();
        }
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            id: self.id,
            endpoint: self.endpoint,
            state: self.state,
            capabilities: self.capabilities,
            observers: self.observers.clone(),
        }
    }
}

impl fmt::Debug for ConnectionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRecord")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .field("observers", &self.observers)
            .finish()
    }
}

impl Drop for ConnectionRecord {
    fn drop(&mut self) {
        self.stop_heartbeat();
    }
}

/// Authoritative map of live connections, indexed by id and by active endpoint
#[derive(Debug, Default)]
pub struct ConnectionTable {
    records: BTreeMap<ConnectionId, ConnectionRecord>,
    active: HashMap<Endpoint, ConnectionId>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: ConnectionRecord) {
        assert!(
            !self.records.contains_key(&record.id),
            "connection {} inserted twice",
            record.id
        );
        if record.state.is_active() {
            if let Some(existing) = self.active.get(&record.endpoint) {
                panic!(
                    "endpoint {} already has active connection {}",
                    record.endpoint, existing
                );
            }
            self.active.insert(record.endpoint, record.id);
        }
        self.records.insert(record.id, record);
    }

    pub fn get(&self, id: ConnectionId) -> Option<&ConnectionRecord> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut ConnectionRecord> {
        self.records.get_mut(&id)
    }

    /// Only connecting or open records match.
    pub fn get_by_endpoint(&self, endpoint: &Endpoint) -> Option<&ConnectionRecord> {
        self.active.get(endpoint).and_then(|id| self.records.get(id))
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<ConnectionRecord> {
        let record = self.records.remove(&id)?;
        if self.active.get(&record.endpoint) == Some(&id) {
            self.active.remove(&record.endpoint);
        }
        Some(record)
    }

    pub fn transition(&mut self, id: ConnectionId, state: ReadyState) -> Result<()> {
        let record = self.records.get_mut(&id).ok_or(RegistryError::UnknownIdentifier(id))?;
        record.state = state;
        if state.is_terminal() && self.active.get(&record.endpoint) == Some(&id) {
            self.active.remove(&record.endpoint);
        }
        Ok(())
    }

    /// Clear `name` from every record referencing it.
    pub fn detach_observer(&mut self, name: &str) -> usize {
        let mut detached = 0;
        for record in self.records.values_mut() {
            let before = record.observers.len();
            record.observers.retain(|o| o != name);
            detached += before - record.observers.len();
        }
        detached
    }

    pub fn drain(&mut self) -> Vec<ConnectionRecord> {
        self.active.clear();
        std::mem::take(&mut self.records).into_values().collect()
    }
}
