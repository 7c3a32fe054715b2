mod logging;

pub use logging::LoggingObserver;
