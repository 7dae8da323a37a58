pub mod event_mapping;
pub mod google_api;
pub mod google_auth;
pub mod loopback;
pub mod sync_engine;

pub use event_mapping::{EventBody, EventDateTime, EventMapper};
pub use sync_engine::{FailurePolicy, SyncEngine, SyncError, SyncReport, WipeOutcome};
