pub mod maintenance;
pub mod memory;
pub mod model;
pub mod queue;
pub mod repo;
pub mod store;

pub use maintenance::LeaseReaper;
pub use memory::MemoryJobStore;
pub use model::{Job, JobStatus, NewJob, StatusCounts, FULL_SUITE};
pub use queue::{QueueCoordinator, QueueOptions, TransitionPolicy};
pub use repo::PgJobStore;
pub use store::{JobStore, MAX_LEASE};
