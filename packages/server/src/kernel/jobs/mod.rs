//! Job infrastructure for background command execution.
//!
//! This module provides the kernel-level infrastructure for job execution:
//! - [`PostgresJobQueue`] - Database-backed job queue
//! - [`JobRunner`] - Long-running service that polls and executes jobs
//! - [`JobRegistry`] - Maps job types to domain handlers
//! - [`Job`] - Job model with CRUD operations
//!
//! # Architecture
//!
//! ```text
//! Action calls enqueue_command(queue, cmd)
//!     │
//!     └─► JobQueue.enqueue()
//!             └─► Insert to DB (idempotency key checked first)
//!
//! JobRunner
//!     │
//!     ├─► Poll DB (claim jobs via JobQueue)
//!     ├─► JobRegistry.execute(job, deps)
//!     └─► Mark succeeded/failed
//! ```
//!
//! # Domain-Specific Background Commands
//!
//! Background commands and their handlers live in their respective domains.
//! This module only provides the infrastructure - business logic stays in domains.

mod job;
mod queue;
mod registry;
mod runner;
pub mod testing;

pub use job::{ErrorKind, Job, JobStatus};
pub use queue::{
    enqueue_command, ClaimedJob, CommandMeta, EnqueueResult, JobQueue, NewJob, PostgresJobQueue,
};
pub use registry::{DispatchError, JobRegistry, SharedJobRegistry};
pub use runner::{JobRunner, JobRunnerConfig};
