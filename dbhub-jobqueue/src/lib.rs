//! Job queue (§4.4): a durable, claimable queue of operations targeted at
//! live nodes, backed by Postgres `LISTEN`/`NOTIFY` and `SKIP LOCKED`, with
//! an in-memory fake for tests.

pub mod error;
pub mod mem;
pub mod pg;
pub mod queue;
pub mod types;

pub use error::{JobQueueError, JobQueueResult};
pub use mem::MemJobQueue;
pub use pg::PgJobQueue;
pub use queue::JobQueue;
pub use types::{ClaimedJob, JobState, ResponseRow, SubmitterInstance, ANY_NODE};
