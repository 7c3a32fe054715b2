mod logger;

pub use logger::TracingEventLogger;
