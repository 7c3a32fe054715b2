pub mod adapters;
pub mod domain;
pub mod ports;
pub mod registry;

pub use registry::Registry;
