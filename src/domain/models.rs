use std::fmt;
use std::net::SocketAddr;
use std::ops::BitOr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConnectError;

/// Remote device address and port.
pub type Endpoint = SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Reported only when a callback is resolved before an identifier was assigned.
    pub const INVALID: ConnectionId = ConnectionId(0);

    pub(crate) fn new(value: u64) -> Self {
        ConnectionId(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closed,
    Failed,
}

impl ReadyState {
    /// Connecting and open records own their endpoint.
    pub fn is_active(&self) -> bool {
        matches!(self, ReadyState::Connecting | ReadyState::Open)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadyState::Connecting => write!(f, "connecting"),
            ReadyState::Open => write!(f, "open"),
            ReadyState::Closed => write!(f, "closed"),
            ReadyState::Failed => write!(f, "failed"),
        }
    }
}

/// Capability bitmask negotiated with the device at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceCapabilities(u64);

impl DeviceCapabilities {
    pub const NONE: DeviceCapabilities = DeviceCapabilities(0);
    pub const VIDEO_OUT: DeviceCapabilities = DeviceCapabilities(1 << 0);
    pub const VIDEO_IN: DeviceCapabilities = DeviceCapabilities(1 << 1);
    pub const AUDIO_OUT: DeviceCapabilities = DeviceCapabilities(1 << 2);
    pub const AUDIO_IN: DeviceCapabilities = DeviceCapabilities(1 << 3);
    pub const DEV_MODE: DeviceCapabilities = DeviceCapabilities(1 << 4);
    pub const MULTIZONE_GROUP: DeviceCapabilities = DeviceCapabilities(1 << 5);

    pub fn from_bits(bits: u64) -> Self {
        DeviceCapabilities(bits)
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    pub fn contains(&self, other: DeviceCapabilities) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for DeviceCapabilities {
    type Output = DeviceCapabilities;

    fn bitor(self, rhs: Self) -> Self::Output {
        DeviceCapabilities(self.0 | rhs.0)
    }
}

impl fmt::Display for DeviceCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenTimeouts {
    pub connect: Duration,
    /// `None` disables heartbeat monitoring once the connection is open.
    pub liveness: Option<Duration>,
    pub heartbeat: Duration,
}

impl OpenTimeouts {
    pub const DEFAULT_CONNECT: Duration = Duration::from_secs(10);
    pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(5);
    pub const DEFAULT_LIVENESS: Duration = Duration::from_secs(10);

    pub fn new(connect: Duration, liveness: Option<Duration>, heartbeat: Duration) -> Self {
        Self {
            connect,
            liveness,
            heartbeat,
        }
    }

    /// Period of the heartbeat task, if the connection is monitored at all.
    pub(crate) fn heartbeat_period(&self) -> Option<Duration> {
        let liveness = self.liveness?;
        if self.heartbeat.is_zero() {
            Some(liveness)
        } else {
            Some(self.heartbeat)
        }
    }
}

impl Default for OpenTimeouts {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_CONNECT,
            Some(Self::DEFAULT_LIVENESS),
            Self::DEFAULT_HEARTBEAT,
        )
    }
}

/// Parameters of one `open` call.
#[derive(Debug, Clone)]
pub struct OpenRequest {
    pub endpoint: Endpoint,
    /// Falls back to the registry's configured defaults.
    pub timeouts: Option<OpenTimeouts>,
    pub capabilities: DeviceCapabilities,
    pub observer: Option<String>,
}

impl OpenRequest {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            timeouts: None,
            capabilities: DeviceCapabilities::NONE,
            observer: None,
        }
    }

    pub fn with_timeouts(mut self, timeouts: OpenTimeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    pub fn with_capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_observer(mut self, name: impl Into<String>) -> Self {
        self.observer = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenStatus {
    Open,
    Failed(ConnectError),
}

impl OpenStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, OpenStatus::Open)
    }
}

impl fmt::Display for OpenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenStatus::Open => write!(f, "open"),
            OpenStatus::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Runtime event reported by a transport for an established connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Message(Vec<u8>),
    /// Heartbeat acknowledged by the peer.
    Heartbeat,
    Error(super::ChannelError),
}

/// Caller-visible copy of a connection record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub id: ConnectionId,
    pub endpoint: Endpoint,
    pub state: ReadyState,
    pub capabilities: DeviceCapabilities,
    pub observers: Vec<String>,
}

/// Kinds of lifecycle events recorded through the event logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    OpenRequested,
    AttemptJoined,
    Reused,
    Connecting,
    Opened,
    ConnectFailed,
    Closed,
    Failed,
    MessageReceived,
    MessageDropped,
    HeartbeatSent,
    ShutDown,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::OpenRequested => "open_requested",
            EventKind::AttemptJoined => "attempt_joined",
            EventKind::Reused => "reused",
            EventKind::Connecting => "connecting",
            EventKind::Opened => "opened",
            EventKind::ConnectFailed => "connect_failed",
            EventKind::Closed => "closed",
            EventKind::Failed => "failed",
            EventKind::MessageReceived => "message_received",
            EventKind::MessageDropped => "message_dropped",
            EventKind::HeartbeatSent => "heartbeat_sent",
            EventKind::ShutDown => "shut_down",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub connect_timeout_secs: u64,
    /// 0 disables liveness monitoring.
    pub liveness_timeout_secs: u64,
    pub heartbeat_interval_secs: u64,
    pub capabilities: DeviceCapabilities,
    pub endpoints: Vec<Endpoint>,
    pub observer: Option<String>,
}

impl RegistryConfig {
    pub fn default_timeouts(&self) -> OpenTimeouts {
        let liveness = match self.liveness_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        OpenTimeouts::new(
            Duration::from_secs(self.connect_timeout_secs),
            liveness,
            Duration::from_secs(self.heartbeat_interval_secs),
        )
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: OpenTimeouts::DEFAULT_CONNECT.as_secs(),
            liveness_timeout_secs: OpenTimeouts::DEFAULT_LIVENESS.as_secs(),
            heartbeat_interval_secs: OpenTimeouts::DEFAULT_HEARTBEAT.as_secs(),
            capabilities: DeviceCapabilities::NONE,
            endpoints: Vec::new(),
            observer: None,
        }
    }
}
