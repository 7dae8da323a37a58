pub mod record;
pub mod store;

pub use record::{Attendee, EventRecord, EventTime};
pub use store::{EventStore, NewEvent, StoreError};
