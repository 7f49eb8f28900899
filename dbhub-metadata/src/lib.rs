//! Metadata DAO surface (§4.7): the core's only view of the external
//! relational schema, behind a `MetadataStore` trait so the dispatch layer
//! is independent of whether Postgres or an in-memory fake backs it.

pub mod error;
pub mod mem;
pub mod pg;
pub mod store;
pub mod types;

pub use error::{MetadataError, MetadataResult};
pub use mem::InMemoryMetadataStore;
pub use pg::PgMetadataStore;
pub use store::MetadataStore;
pub use types::{BlobLocation, LiveDbRecord, QueryLogId};
