//! Change Data Capture (CDC) replication pipeline
//!
//! Decodes Debezium change envelopes, canonicalizes them into sink-agnostic
//! records and fans each record out to every configured document sink.

pub mod ack;
pub mod canonical;
pub mod consumer;
pub mod dispatch;
pub mod envelope;
pub mod sink;

pub use ack::{AckDecision, MessageState};
pub use canonical::{canonicalize, CanonicalRecord, Canonicalized, CanonicalizationWarning};
pub use consumer::{channel_subscription, DeliveryLoop, InboundMessage, Subscription};
pub use dispatch::{DispatchMode, FanoutDispatcher};
pub use envelope::{decode, ChangeEnvelope, ChangePayload, Operation};
pub use sink::{DeliveryOutcome, DocumentSink, InMemorySink, SinkTarget, StdoutSink};
