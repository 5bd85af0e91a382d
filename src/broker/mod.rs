//! Inbound broker adapters.
//!
//! Each adapter implements [`crate::cdc::consumer::Subscription`] so the
//! delivery loop stays broker-agnostic.

#[cfg(feature = "amqp")]
pub mod amqp;

#[cfg(feature = "amqp")]
pub use amqp::{AmqpMessage, AmqpSubscription};
