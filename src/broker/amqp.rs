// RabbitMQ subscription

use crate::cdc::ack::AckDecision;
use crate::cdc::consumer::{InboundMessage, Subscription};
use crate::config::BrokerConfig;
use crate::error::{ReplicatorError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use tracing::{info, warn};

/// Connects to the broker, retrying on failure.
pub async fn connect_with_retry(config: &BrokerConfig) -> Result<Connection> {
    let mut last_error = None;

    for attempt in 1..=config.connect_attempts {
        match Connection::connect(&config.uri, ConnectionProperties::default()).await {
            Ok(connection) => {
                info!(attempt, "Connected to RabbitMQ");
                return Ok(connection);
            }
            Err(e) => {
                warn!(
                    attempt,
                    max_attempts = config.connect_attempts,
                    retry_in = ?config.connect_retry_delay,
                    error = %e,
                    "Failed to connect to RabbitMQ"
                );
                last_error = Some(e);
                if attempt < config.connect_attempts {
                    tokio::time::sleep(config.connect_retry_delay).await;
                }
            }
        }
    }

    Err(ReplicatorError::ConnectionFailed(format!(
        "RabbitMQ unreachable after {} attempts: {}",
        config.connect_attempts,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}

/// Maps a configured exchange type
pub fn exchange_kind(exchange_type: &str) -> ExchangeKind {
    match exchange_type {
        "direct" => ExchangeKind::Direct,
        "fanout" => ExchangeKind::Fanout,
        "headers" => ExchangeKind::Headers,
        "topic" => ExchangeKind::Topic,
        other => ExchangeKind::Custom(other.to_string()),
    }
}

/// Built-in exchanges cannot be redeclared by clients
fn is_builtin_exchange(name: &str) -> bool {
    name.is_empty() || name.starts_with("amq.")
}

/// Manual-ack consumer on a durable queue
pub struct AmqpSubscription {
    consumer: Consumer,
    channel: Channel,
    connection: Connection,
}

impl AmqpSubscription {
    /// Connects, declares the topology and starts consuming
    pub async fn open(config: &BrokerConfig) -> Result<Self> {
        let connection = connect_with_retry(config).await?;
        let channel = connection.create_channel().await?;

        if !is_builtin_exchange(&config.exchange_name) {
            channel
                .exchange_declare(
                    &config.exchange_name,
                    exchange_kind(&config.exchange_type),
                    ExchangeDeclareOptions {
                        durable: true,
                        ..ExchangeDeclareOptions::default()
                    },
                    FieldTable::default(),
                )
                .await?;
        }

        let queue = channel
            .queue_declare(
                &config.queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;

        channel
            .queue_bind(
                queue.name().as_str(),
                &config.exchange_name,
                &config.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let consumer = channel
            .basic_consume(
                queue.name().as_str(),
                &config.consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!(
            queue = %config.queue_name,
            exchange = %config.exchange_name,
            binding = %config.routing_key,
            "Consuming from RabbitMQ"
        );

        Ok(Self {
            consumer,
            channel,
            connection,
        })
    }

    /// Closes the channel and the connection
    pub async fn close(self) -> Result<()> {
        self.channel.close(200, "shutdown").await?;
        self.connection.close(200, "shutdown").await?;
        Ok(())
    }
}

#[async_trait]
impl Subscription for AmqpSubscription {
    type Message = AmqpMessage;

    async fn next_message(&mut self) -> Option<Result<AmqpMessage>> {
        self.consumer
            .next()
            .await
            .map(|delivery| delivery.map(AmqpMessage).map_err(ReplicatorError::from))
    }
}

/// One RabbitMQ delivery
pub struct AmqpMessage(Delivery);

#[async_trait]
impl InboundMessage for AmqpMessage {
    fn routing_key(&self) -> &str {
        self.0.routing_key.as_str()
    }

    fn body(&self) -> &[u8] {
        &self.0.data
    }

    async fn settle(&mut self, decision: AckDecision) -> Result<()> {
        let result = match decision {
            AckDecision::Ack => self.0.acker.ack(BasicAckOptions::default()).await,
            AckDecision::RejectWithoutRequeue => {
                self.0
                    .acker
                    .nack(BasicNackOptions {
                        multiple: false,
                        requeue: false,
                    })
                    .await
            }
        };
        result?;
        Ok(())
    }
}
