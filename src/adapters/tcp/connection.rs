use crate::domain::{ChannelError, ConnectError, ConnectionId, DeviceCapabilities, Endpoint};
use crate::ports::{Connection, Connector, EventSink};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Connector creating plain TCP connections
#[derive(Debug, Default, Clone)]
pub struct TcpConnector;

impl TcpConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for TcpConnector {
    fn create(&self, id: ConnectionId, endpoint: Endpoint) -> Arc<dyn Connection> {
        Arc::new(TcpConnection::new(id, endpoint))
    }
}

/// Raw TCP transport: inbound bytes are reported as messages, payloads are
/// written as-is.
///
/// There is no keep-alive frame on the wire. A ping is answered locally
/// once the socket is writable; a peer going away is reported by the
/// reader.
pub struct TcpConnection {
    id: ConnectionId,
    endpoint: Endpoint,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    events: Mutex<Option<EventSink>>,
    closed: AtomicBool,
}

impl TcpConnection {
    pub fn new(id: ConnectionId, endpoint: Endpoint) -> Self {
        Self {
            id,
            endpoint,
            writer: tokio::sync::Mutex::new(None),
            reader: Mutex::new(None),
            events: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

async fn read_loop(mut reader: OwnedReadHalf, events: EventSink) {
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => {
                events.error(ChannelError::ClosedByPeer);
                break;
            }
            Ok(n) => events.message(buffer[..n].to_vec()),
            Err(e) => {
                events.error(ChannelError::Network(e.to_string()));
                break;
            }
        }
    }
}

#[async_trait]
impl Connection for TcpConnection {
    async fn connect(
        &self,
        endpoint: Endpoint,
        capabilities: DeviceCapabilities,
        events: EventSink,
    ) -> Result<DeviceCapabilities, ConnectError> {
        let stream = TcpStream::connect(endpoint).await.map_err(|e| {
            log::debug!("Failed to connect to {}: {}", endpoint, e);
            match e.kind() {
                ErrorKind::ConnectionRefused => ConnectError::ConnectRefused,
                _ => ConnectError::NetworkError(e.to_string()),
            }
        })?;
        if self.is_closed() {
            return Err(ConnectError::AlreadyClosedDuringSetup);
        }
        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("Cannot disable Nagle on {}: {}", endpoint, e);
        }

        let (read_half, write_half) = stream.into_split();
        *self.writer.lock().await = Some(write_half);
        if let Ok(mut sink) = self.events.lock() {
            *sink = Some(events.clone());
        }
        let task = tokio::spawn(read_loop(read_half, events));
        if let Ok(mut reader) = self.reader.lock() {
            *reader = Some(task);
        }

        log::debug!("{} connected to {}", self.id, endpoint);
        // The raw transport negotiates nothing: the device is assumed to
        // support what was asked for.
        Ok(capabilities)
    }

    async fn send(&self, payload: Vec<u8>) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Network(format!("{} is closed", self.id)));
        }
        let mut writer = self.writer.lock().await;
        match writer.as_mut() {
            Some(w) => w
                .write_all(&payload)
                .await
                .map_err(|e| ChannelError::Network(e.to_string())),
            None => Err(ChannelError::Network(format!("{} is not connected", self.id))),
        }
    }

    async fn ping(&self) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Network(format!("{} is closed", self.id)));
        }
        {
            let writer = self.writer.lock().await;
            let stream: &TcpStream = match writer.as_ref() {
                Some(w) => w.as_ref(),
                None => return Err(ChannelError::Network(format!("{} is not connected", self.id))),
            };
            stream
                .writable()
                .await
                .map_err(|e| ChannelError::Network(e.to_string()))?;
        }

        let events = self.events.lock().ok().and_then(|sink| sink.clone());
        if let Some(events) = events {
            events.heartbeat();
        }
        Ok(())
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut reader) = self.reader.lock() {
            if let Some(task) = reader.take() {
                task.abort();
            }
        }
        if let Ok(mut writer) = self.writer.try_lock() {
            writer.take();
        }
        if let Ok(mut events) = self.events.lock() {
            events.take();
        }
        log::debug!("Closed {} to {}", self.id, self.endpoint);
    }
}
