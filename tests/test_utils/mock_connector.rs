#![cfg(test)]
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use peerlink::domain::{ChannelError, ConnectError, ConnectionId, DeviceCapabilities, Endpoint};
use peerlink::ports::{Connection, Connector, EventSink};

/// How a mock connection answers `connect`
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Succeed with the requested capabilities
    Accept,
    /// Succeed with a fixed capability set
    Negotiate(DeviceCapabilities),
    Refuse,
    /// Never complete
    Hang,
    /// Succeed once the test calls `MockConnection::release`
    Gated,
}

pub struct MockConnection {
    pub id: ConnectionId,
    pub endpoint: Endpoint,
    behavior: Behavior,
    gate: Notify,
    answer_pings: AtomicBool,
    closed: AtomicBool,
    pings: AtomicUsize,
    sent: Mutex<Vec<Vec<u8>>>,
    sink: Mutex<Option<EventSink>>,
}

impl MockConnection {
    fn new(id: ConnectionId, endpoint: Endpoint, behavior: Behavior, answer_pings: bool) -> Self {
        Self {
            id,
            endpoint,
            behavior,
            gate: Notify::new(),
            answer_pings: AtomicBool::new(answer_pings),
            closed: AtomicBool::new(false),
            pings: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            sink: Mutex::new(None),
        }
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    /// Pretend the device sent `payload`.
    pub fn inject_message(&self, payload: &[u8]) {
        if let Some(sink) = self.sink.lock().unwrap().as_ref() {
            sink.message(payload.to_vec());
        }
    }

    pub fn inject_error(&self, error: ChannelError) {
        if let Some(sink) = self.sink.lock().unwrap().as_ref() {
            sink.error(error);
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn connect(
        &self,
        _endpoint: Endpoint,
        capabilities: DeviceCapabilities,
        events: EventSink,
    ) -> Result<DeviceCapabilities, ConnectError> {
        *self.sink.lock().unwrap() = Some(events);
        match &self.behavior {
            Behavior::Accept => Ok(capabilities),
            Behavior::Negotiate(negotiated) => Ok(*negotiated),
            Behavior::Refuse => Err(ConnectError::ConnectRefused),
            Behavior::Hang => futures::future::pending().await,
            Behavior::Gated => {
                self.gate.notified().await;
                Ok(capabilities)
            }
        }
    }

    async fn send(&self, payload: Vec<u8>) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Network("closed".into()));
        }
        self.sent.lock().unwrap().push(payload);
        Ok(())
    }

    async fn ping(&self) -> Result<(), ChannelError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.answer_pings.load(Ordering::SeqCst) {
            if let Some(sink) = self.sink.lock().unwrap().as_ref() {
                sink.heartbeat();
            }
        }
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Connector whose connections follow a per-endpoint script
#[derive(Default)]
pub struct MockConnector {
    behaviors: Mutex<HashMap<Endpoint, Behavior>>,
    answer_pings: AtomicBool,
    created: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, endpoint: Endpoint, behavior: Behavior) {
        self.behaviors.lock().unwrap().insert(endpoint, behavior);
    }

    pub fn answer_pings(&self, answer: bool) {
        self.answer_pings.store(answer, Ordering::SeqCst);
    }

    pub fn connection(&self, id: ConnectionId) -> Arc<MockConnection> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .unwrap_or_else(|| panic!("no connection created for {}", id))
    }

    pub fn created_for(&self, endpoint: Endpoint) -> usize {
        self.created
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.endpoint == endpoint)
            .count()
    }
}

impl Connector for MockConnector {
    fn create(&self, id: ConnectionId, endpoint: Endpoint) -> Arc<dyn Connection> {
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(&endpoint)
            .cloned()
            .unwrap_or(Behavior::Accept);
        let connection = Arc::new(MockConnection::new(
            id,
            endpoint,
            behavior,
            self.answer_pings.load(Ordering::SeqCst),
        ));
        self.created.lock().unwrap().push(connection.clone());
        connection
    }
}
