use crate::domain::{ChannelError, ConnectionId};

/// Port for receiving runtime events of open connections
///
/// Observers are owned by the registry's observer directory and referenced
/// from connections by name only.
pub trait ConnectionObserver: Send {
    fn on_message(&mut self, id: ConnectionId, payload: &[u8]);

    fn on_error(&mut self, id: ConnectionId, error: ChannelError);
}
