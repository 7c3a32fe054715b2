#![cfg(test)]
#![allow(dead_code)]

pub mod mock_connector;
pub mod recorder;

pub use mock_connector::{Behavior, MockConnection, MockConnector};
pub use recorder::{Record, Recorder, RecordingObserver};
