//! Dispatch API (§4.6): the typed surface a front-end talks to, sitting on
//! top of the job queue (C4), response multiplexer (C5) and metadata store
//! (C7).

pub mod dispatcher;
pub mod error;
pub mod validate;

pub use dispatcher::Dispatcher;
pub use error::{DispatchError, DispatchResult};
