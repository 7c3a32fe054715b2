pub mod allocator;
pub mod errors;
pub mod models;
pub mod observers;
pub mod opener;
pub mod sequence;
pub mod service;
pub mod table;

pub use allocator::IdAllocator;
pub use errors::*;
pub use models::*;
pub use observers::ObserverDirectory;
pub use opener::{Attempt, OpenCallback, PendingAttempts};
pub use sequence::SequenceChecker;
pub use service::ConnectionRegistry;
pub use table::{ConnectionRecord, ConnectionTable};
