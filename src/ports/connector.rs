use crate::domain::{ChannelError, ConnectError, ConnectionEvent, ConnectionId, DeviceCapabilities, Endpoint};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Port for creating transport connections to remote devices
pub trait Connector: Send + Sync {
    /// Build an unconnected transport for `endpoint`
    ///
    /// The registry drives `connect` itself, bounded by the attempt's timeout.
    fn create(&self, id: ConnectionId, endpoint: Endpoint) -> Arc<dyn Connection>;
}

/// One socket to one remote device
#[async_trait]
pub trait Connection: Send + Sync {
    /// Establish the connection and return the negotiated capabilities
    ///
    /// Runtime events after a successful connect are reported through `events`.
    async fn connect(
        &self,
        endpoint: Endpoint,
        capabilities: DeviceCapabilities,
        events: EventSink,
    ) -> Result<DeviceCapabilities, ConnectError>;

    async fn send(&self, payload: Vec<u8>) -> Result<(), ChannelError>;

    /// Send a keep-alive probe; the peer's answer comes back as `ConnectionEvent::Heartbeat`
    async fn ping(&self) -> Result<(), ChannelError>;

    /// Tear the transport down. Must be idempotent.
    fn close(&self);
}

type Deliver = dyn Fn(ConnectionId, ConnectionEvent) + Send + Sync;

/// Handle a transport uses to report events for its connection
#[derive(Clone)]
pub struct EventSink {
    id: ConnectionId,
    deliver: Arc<Deliver>,
}

impl EventSink {
    pub fn new<F>(id: ConnectionId, deliver: F) -> Self
    where
        F: Fn(ConnectionId, ConnectionEvent) + Send + Sync + 'static,
    {
        Self {
            id,
            deliver: Arc::new(deliver),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn message(&self, payload: Vec<u8>) {
        (self.deliver)(self.id, ConnectionEvent::Message(payload));
    }

    pub fn heartbeat(&self) {
        (self.deliver)(self.id, ConnectionEvent::Heartbeat);
    }

    pub fn error(&self, error: ChannelError) {
        (self.deliver)(self.id, ConnectionEvent::Error(error));
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink").field("id", &self.id).finish()
    }
}
