pub mod events;
pub mod storage;
pub mod sync;

pub use events::{EventRecord, EventStore, EventTime};
pub use storage::config::Config;
pub use sync::{EventMapper, FailurePolicy, SyncEngine, SyncReport};
