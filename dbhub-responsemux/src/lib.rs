//! Response multiplexer (§4.5): turns the job queue's durable-queue
//! semantics into a synchronous call shape for front-end callers.

pub mod checker;
pub mod error;
pub mod multiplexer;

pub use checker::run_response_checker;
pub use error::{MuxError, MuxResult};
pub use multiplexer::ResponseMultiplexer;
