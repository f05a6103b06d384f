//! Background dispatch engine: job store, claim queues, provider routing,
//! and the worker pool that drives generation attempts.

pub mod config;
pub mod pool;
pub mod queue;
pub mod registry;
pub mod router;
pub mod store;

pub use config::DispatchConfig;
pub use pool::{WorkerPool, WorkerSnapshot, WorkerStatus};
pub use queue::JobQueue;
pub use registry::{ProviderRegistry, ProviderSnapshot};
pub use router::ProviderRouter;
pub use store::{JobSelector, JobStore, StoreCounts};
