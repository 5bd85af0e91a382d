// CDC Delivery Loop

use super::ack::{AckDecision, MessageState};
use super::canonical::canonicalize;
use super::dispatch::FanoutDispatcher;
use super::envelope;
use super::sink::DeliveryOutcome;
use crate::error::{ReplicatorError, Result};
use crate::observability;
use crate::shutdown::ShutdownCoordinator;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

/// A message pulled from the inbound subscription
#[async_trait]
pub trait InboundMessage: Send {
    /// Dot-delimited routing key the message was published with
    fn routing_key(&self) -> &str;

    /// Raw message body
    fn body(&self) -> &[u8];

    /// Sends the acknowledgment decision back to the broker
    async fn settle(&mut self, decision: AckDecision) -> Result<()>;
}

/// Long-lived source of inbound messages.
///
/// Keeping the underlying connection alive is the implementation's concern.
#[async_trait]
pub trait Subscription: Send {
    type Message: InboundMessage;

    /// Waits for the next message. `None` means the subscription has ended.
    async fn next_message(&mut self) -> Option<Result<Self::Message>>;
}

/// Summary of one processed message
#[derive(Debug, Clone)]
pub struct ProcessedMessage {
    pub routing_key: String,
    pub state: MessageState,
    pub decision: AckDecision,
    pub outcomes: Vec<DeliveryOutcome>,
    pub warnings: usize,
}

/// Delivery loop counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub received: u64,
    pub acknowledged: u64,
    pub rejected: u64,
    pub sink_failures: u64,
    pub subscription_errors: u64,
}

/// Drains a subscription one message at a time.
pub struct DeliveryLoop<S: Subscription> {
    subscription: S,
    dispatcher: FanoutDispatcher,
    shutdown: ShutdownCoordinator,
    stats: LoopStats,
}

impl<S: Subscription> DeliveryLoop<S> {
    pub fn new(subscription: S, dispatcher: FanoutDispatcher, shutdown: ShutdownCoordinator) -> Self {
        Self {
            subscription,
            dispatcher,
            shutdown,
            stats: LoopStats::default(),
        }
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Hands the subscription back, e.g. to close it
    pub fn into_subscription(self) -> S {
        self.subscription
    }

    /// Runs until shutdown is requested or the subscription ends.
    ///
    /// Shutdown is only observed while waiting for the next message.
    pub async fn run(&mut self) -> LoopStats {
        info!(
            sinks = self.dispatcher.targets().len(),
            mode = ?self.dispatcher.mode(),
            write_timeout = ?self.dispatcher.write_timeout(),
            "Starting to consume messages"
        );

        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.wait_for_shutdown() => {
                    info!("Shutdown requested, stopping delivery loop");
                    break;
                }
                next = self.subscription.next_message() => next,
            };

            match next {
                None => {
                    warn!("Subscription ended");
                    break;
                }
                Some(Err(e)) => {
                    self.stats.subscription_errors += 1;
                    warn!(error = %e, "Failed to receive message");
                }
                Some(Ok(message)) => {
                    if let Err(e) = self.process(message).await {
                        error!(error = %e, "Message processing failed");
                    }
                }
            }
        }

        info!(
            received = self.stats.received,
            acknowledged = self.stats.acknowledged,
            rejected = self.stats.rejected,
            "Delivery loop stopped"
        );
        self.stats.clone()
    }

    /// Decodes, canonicalizes, dispatches and settles one message
    pub async fn process(&mut self, mut message: S::Message) -> Result<ProcessedMessage> {
        let routing_key = message.routing_key().to_string();
        info!(routing_key = %routing_key, "Received a message");
        observability::record_message_received();
        self.stats.received += 1;

        let state = MessageState::Received.begin_decode()?;
        let decoded = envelope::decode(message.body());
        let mut state = state.finish_decode(decoded.is_ok())?;

        let mut outcomes = Vec::new();
        let mut warnings = 0;

        match decoded {
            Ok(payload) => {
                let canonical = canonicalize(&payload, &routing_key);
                for warning in &canonical.warnings {
                    warn!(routing_key = %routing_key, warning = %warning, "Canonicalization warning");
                    observability::record_canonicalization_warning();
                }
                warnings = canonical.warnings.len();

                state = state.begin_dispatch()?;
                outcomes = self.dispatcher.dispatch(&canonical.record, &routing_key).await;
                self.stats.sink_failures +=
                    outcomes.iter().filter(|o| !o.is_delivered()).count() as u64;
            }
            Err(e) => {
                warn!(routing_key = %routing_key, error = %e, "Rejecting undecodable message");
            }
        }

        let (state, decision) = state.settle()?;
        if let Err(e) = message.settle(decision).await {
            warn!(routing_key = %routing_key, decision = %decision, error = %e, "Failed to settle message");
        }
        observability::record_ack(decision);

        match decision {
            AckDecision::Ack => self.stats.acknowledged += 1,
            AckDecision::RejectWithoutRequeue => self.stats.rejected += 1,
        }

        Ok(ProcessedMessage {
            routing_key,
            state,
            decision,
            outcomes,
            warnings,
        })
    }
}

/// Message delivered through an in-process channel
pub struct ChannelMessage {
    routing_key: String,
    body: Vec<u8>,
    settled: Option<oneshot::Sender<AckDecision>>,
}

impl ChannelMessage {
    /// Creates a message and the receiver its decision is reported on
    pub fn new(
        routing_key: impl Into<String>,
        body: impl Into<Vec<u8>>,
    ) -> (Self, oneshot::Receiver<AckDecision>) {
        let (tx, rx) = oneshot::channel();
        let message = Self {
            routing_key: routing_key.into(),
            body: body.into(),
            settled: Some(tx),
        };
        (message, rx)
    }
}

#[async_trait]
impl InboundMessage for ChannelMessage {
    fn routing_key(&self) -> &str {
        &self.routing_key
    }

    fn body(&self) -> &[u8] {
        &self.body
    }

    async fn settle(&mut self, decision: AckDecision) -> Result<()> {
        match self.settled.take() {
            Some(tx) => {
                // The publisher may have stopped listening
                let _ = tx.send(decision);
                Ok(())
            }
            None => Err(ReplicatorError::InvalidState(
                "message already settled".to_string(),
            )),
        }
    }
}

/// In-process subscription fed by a [`ChannelPublisher`]
pub struct ChannelSubscription {
    rx: mpsc::Receiver<ChannelMessage>,
}

#[async_trait]
impl Subscription for ChannelSubscription {
    type Message = ChannelMessage;

    async fn next_message(&mut self) -> Option<Result<ChannelMessage>> {
        self.rx.recv().await.map(Ok)
    }
}

/// Publishing half of an in-process subscription
#[derive(Clone)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<ChannelMessage>,
}

impl ChannelPublisher {
    /// Publishes a message and returns the receiver for its decision
    pub async fn publish(
        &self,
        routing_key: impl Into<String>,
        body: impl Into<Vec<u8>>,
    ) -> Result<oneshot::Receiver<AckDecision>> {
        let (message, decision) = ChannelMessage::new(routing_key, body);
        self.tx
            .send(message)
            .await
            .map_err(|_| ReplicatorError::Broker("subscription closed".to_string()))?;
        Ok(decision)
    }
}

/// Creates a bounded in-process subscription
pub fn channel_subscription(capacity: usize) -> (ChannelPublisher, ChannelSubscription) {
    let (tx, rx) = mpsc::channel(capacity);
    (ChannelPublisher { tx }, ChannelSubscription { rx })
}
