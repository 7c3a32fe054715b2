#![cfg(test)]
#![allow(dead_code)]

use std::time::Duration;

use tokio::sync::mpsc;

use peerlink::domain::{ChannelError, ConnectionId, OpenStatus};
use peerlink::ports::ConnectionObserver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Opened(String, ConnectionId, OpenStatus),
    Message(String, ConnectionId, Vec<u8>),
    Error(String, ConnectionId, ChannelError),
}

/// Collects open callbacks and observer events in delivery order
pub struct Recorder {
    tx: mpsc::UnboundedSender<Record>,
    rx: mpsc::UnboundedReceiver<Record>,
}

impl Recorder {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn callback(&self, tag: &str) -> impl FnOnce(ConnectionId, OpenStatus) + Send + 'static {
        let tx = self.tx.clone();
        let tag = tag.to_string();
        move |id, status| {
            let _ = tx.send(Record::Opened(tag, id, status));
        }
    }

    pub fn observer(&self, tag: &str) -> Box<dyn ConnectionObserver> {
        Box::new(RecordingObserver {
            tag: tag.to_string(),
            tx: self.tx.clone(),
        })
    }

    /// Everything recorded so far, without waiting.
    pub fn drain(&mut self) -> Vec<Record> {
        let mut records = Vec::new();
        while let Ok(record) = self.rx.try_recv() {
            records.push(record);
        }
        records
    }

    pub async fn next(&mut self) -> Record {
        tokio::time::timeout(Duration::from_secs(120), self.rx.recv())
            .await
            .expect("Should record an event within timeout")
            .expect("Recorder channel closed")
    }
}

pub struct RecordingObserver {
    tag: String,
    tx: mpsc::UnboundedSender<Record>,
}

impl ConnectionObserver for RecordingObserver {
    fn on_message(&mut self, id: ConnectionId, payload: &[u8]) {
        let _ = self.tx.send(Record::Message(self.tag.clone(), id, payload.to_vec()));
    }

    fn on_error(&mut self, id: ConnectionId, error: ChannelError) {
        let _ = self.tx.send(Record::Error(self.tag.clone(), id, error));
    }
}
