//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod directory;
pub mod job_queue;
pub mod nats;
pub mod stream_hub;
pub mod test_dependencies;
pub mod traits;

pub use deps::ServerDeps;
pub use directory::PgDirectory;
pub use job_queue::{JobHandler, JobQueue};
pub use nats::{NatsClientPublisher, NatsPublisher, NatsTransport, PublishedMessage, TestNats};
pub use stream_hub::StreamHub;
pub use test_dependencies::TestDependencies;
pub use traits::*;
