//! Document-store adapters.
//!
//! Each adapter implements [`crate::cdc::sink::DocumentSink`].

#[cfg(feature = "mongo")]
pub mod mongo;

#[cfg(feature = "mongo")]
pub use mongo::MongoSink;
