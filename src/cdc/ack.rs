// CDC Message Acknowledgment

use crate::error::{ReplicatorError, Result};
use serde::{Deserialize, Serialize};

/// Signal sent back to the broker for one message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckDecision {
    /// Message fully consumed, safe to delete
    Ack,
    /// Poison message: drop it, never redeliver
    RejectWithoutRequeue,
}

impl std::fmt::Display for AckDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AckDecision::Ack => write!(f, "ack"),
            AckDecision::RejectWithoutRequeue => write!(f, "reject"),
        }
    }
}

/// Processing state of one message.
///
/// ```text
/// Received → Decoding → Decoded → Dispatching → Acknowledged
///                     ↘ DecodeFailed → Rejected
/// ```
///
/// Sink outcomes never feed into the decision: once decoding succeeds the
/// message is acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageState {
    Received,
    Decoding,
    Decoded,
    Dispatching,
    Acknowledged,
    DecodeFailed,
    Rejected,
}

impl MessageState {
    /// Received → Decoding
    pub fn begin_decode(self) -> Result<Self> {
        match self {
            MessageState::Received => Ok(MessageState::Decoding),
            other => Err(invalid(other, "begin decoding")),
        }
    }

    /// Decoding → Decoded | DecodeFailed
    pub fn finish_decode(self, succeeded: bool) -> Result<Self> {
        match (self, succeeded) {
            (MessageState::Decoding, true) => Ok(MessageState::Decoded),
            (MessageState::Decoding, false) => Ok(MessageState::DecodeFailed),
            (other, _) => Err(invalid(other, "finish decoding")),
        }
    }

    /// Decoded → Dispatching
    pub fn begin_dispatch(self) -> Result<Self> {
        match self {
            MessageState::Decoded => Ok(MessageState::Dispatching),
            other => Err(invalid(other, "begin dispatching")),
        }
    }

    /// Dispatching → Acknowledged, DecodeFailed → Rejected
    pub fn settle(self) -> Result<(Self, AckDecision)> {
        match self {
            MessageState::Dispatching => Ok((MessageState::Acknowledged, AckDecision::Ack)),
            MessageState::DecodeFailed => {
                Ok((MessageState::Rejected, AckDecision::RejectWithoutRequeue))
            }
            other => Err(invalid(other, "settle")),
        }
    }
}

fn invalid(state: MessageState, action: &str) -> ReplicatorError {
    ReplicatorError::InvalidState(format!("cannot {} from {:?}", action, state))
}
