use crate::domain::{ConnectionId, EventKind};
use crate::ports::EventLogger;
use tracing::{debug, info, trace};

/// Event logger writing connection lifecycle events to `tracing`
#[derive(Debug, Default, Clone)]
pub struct TracingEventLogger;

impl TracingEventLogger {
    pub fn new() -> Self {
        Self
    }
}

impl EventLogger for TracingEventLogger {
    fn record_event(&self, id: ConnectionId, kind: EventKind, detail: &str) {
        match kind {
            EventKind::MessageReceived | EventKind::HeartbeatSent => {
                trace!(connection = id.value(), %kind, "{}", detail)
            }
            EventKind::Opened | EventKind::Closed | EventKind::Failed | EventKind::ConnectFailed => {
                info!(connection = id.value(), %kind, "{}", detail)
            }
            _ => debug!(connection = id.value(), %kind, "{}", detail),
        }
    }
}
