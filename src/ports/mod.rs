pub mod connector;
pub mod logger;
pub mod observer;

pub use connector::{Connection, Connector, EventSink};
pub use logger::EventLogger;
pub use observer::ConnectionObserver;
