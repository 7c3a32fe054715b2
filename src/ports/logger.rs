use crate::domain::{ConnectionId, EventKind};

/// Port for recording connection lifecycle events
///
/// Best effort: implementations must not block and their failures are ignored.
pub trait EventLogger: Send + Sync {
    fn record_event(&self, id: ConnectionId, kind: EventKind, detail: &str);
}
