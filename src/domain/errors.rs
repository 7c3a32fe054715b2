use std::fmt;

use super::{ConnectionId, DeviceCapabilities};

/// Terminal failure of a connect attempt, delivered through the open callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    ConnectTimeout,
    ConnectRefused,
    NetworkError(String),
    CapabilityMismatch {
        requested: DeviceCapabilities,
        negotiated: DeviceCapabilities,
    },
    AlreadyClosedDuringSetup,
    ShuttingDown,
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectError::ConnectTimeout => write!(f, "Connect timed out"),
            ConnectError::ConnectRefused => write!(f, "Connection refused by peer"),
            ConnectError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            ConnectError::CapabilityMismatch { requested, negotiated } => write!(
                f,
                "Device capabilities {} do not cover requested {}",
                negotiated, requested
            ),
            ConnectError::AlreadyClosedDuringSetup => write!(f, "Connection closed while connecting"),
            ConnectError::ShuttingDown => write!(f, "Registry is shutting down"),
        }
    }
}

impl std::error::Error for ConnectError {}

/// Failure of an open connection, delivered to its observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    LivenessTimeout,
    ClosedByPeer,
    Network(String),
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::LivenessTimeout => write!(f, "Peer missed its liveness deadline"),
            ChannelError::ClosedByPeer => write!(f, "Connection closed by peer"),
            ChannelError::Network(msg) => write!(f, "Network error: {}", msg),
        }
    }
}

impl std::error::Error for ChannelError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    UnknownIdentifier(ConnectionId),
    NotOpen(ConnectionId),
    Stopped,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::UnknownIdentifier(id) => write!(f, "Unknown connection {}", id),
            RegistryError::NotOpen(id) => write!(f, "Connection {} is not open", id),
            RegistryError::Stopped => write!(f, "Registry is no longer running"),
        }
    }
}

impl std::error::Error for RegistryError {}

pub type Result<T> = std::result::Result<T, RegistryError>;
