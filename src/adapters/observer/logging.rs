use crate::domain::{ChannelError, ConnectionId};
use crate::ports::ConnectionObserver;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Observer that logs what it receives
pub struct LoggingObserver {
    name: String,
    received: u64,
    failures: Option<mpsc::UnboundedSender<ConnectionId>>,
}

impl LoggingObserver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            received: 0,
            failures: None,
        }
    }

    /// Also forward the id of every failed connection, for `Registry::spawn_reaper`.
    pub fn with_failures(name: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<ConnectionId>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut observer = Self::new(name);
        observer.failures = Some(tx);
        (observer, rx)
    }

    pub fn received(&self) -> u64 {
        self.received
    }
}

impl ConnectionObserver for LoggingObserver {
    fn on_message(&mut self, id: ConnectionId, payload: &[u8]) {
        self.received += 1;
        info!("[{}] {} sent {} bytes", self.name, id, payload.len());
    }

    fn on_error(&mut self, id: ConnectionId, error: ChannelError) {
        warn!("[{}] {} error: {}", self.name, id, error);
        if let Some(failures) = &self.failures {
            let _ = failures.send(id);
        }
    }
}
