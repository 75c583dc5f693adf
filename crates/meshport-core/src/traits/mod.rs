//! Gateway traits defined in `meshport-core` and implemented by the
//! backend crates.

pub mod metadata;
pub mod queue;
pub mod storage;

pub use metadata::MetadataGateway;
pub use queue::{MessageQueue, QueueMessage};
pub use storage::ObjectStorage;
