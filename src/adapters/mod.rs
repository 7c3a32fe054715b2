pub mod logging;
pub mod observer;
pub mod tcp;

pub use logging::TracingEventLogger;
pub use observer::LoggingObserver;
pub use tcp::{TcpConnection, TcpConnector};
