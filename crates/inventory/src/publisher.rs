//! Availability feed: the message published after every stock change and the
//! sinks it can be published to.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stock_store::{Availability, ProductId, StoreTx};
use thiserror::Error;

/// Availability of one product as published to the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMessage {
    pub product_id: ProductId,
    pub quantity: i64,
    pub reserved: i64,
    pub available: i64,
}

impl StockMessage {
    /// Partition key of the message.
    pub fn key(&self) -> String {
        self.product_id.to_string()
    }
}

impl From<Availability> for StockMessage {
    fn from(a: Availability) -> Self {
        Self {
            product_id: a.product_id,
            quantity: a.quantity,
            reserved: a.reserved,
            available: a.available,
        }
    }
}

/// Errors that can occur when publishing availability.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Broker error: {0}")]
    Broker(String),
}

/// A sink for availability messages.
///
/// Publishing happens inside the caller's transaction; an error aborts it.
#[async_trait]
pub trait AvailabilityPublisher: Send + Sync {
    async fn publish(&self, message: &StockMessage) -> Result<(), PublishError>;
}

/// Computes a product's availability as seen by `tx` and publishes it.
pub async fn publish_availability<T: StoreTx>(
    tx: &mut T,
    publisher: &dyn AvailabilityPublisher,
    product_id: ProductId,
) -> crate::Result<StockMessage> {
    let message = StockMessage::from(tx.available_by_product(product_id).await?);
    if let Err(e) = publisher.publish(&message).await {
        metrics::counter!("availability_publish_failures_total").increment(1);
        tracing::error!(%product_id, error = %e, "failed to publish availability");
        return Err(e.into());
    }
    metrics::counter!("availability_published_total").increment(1);
    Ok(message)
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    messages: Vec<StockMessage>,
    fail: bool,
}

/// In-memory publisher for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPublisher {
    state: Arc<Mutex<InMemoryPublisherState>>,
}

impl InMemoryPublisher {
    /// Creates a new in-memory publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the publisher to reject every message.
    pub fn set_fail(&self, fail: bool) {
        self.lock().fail = fail;
    }

    /// Returns every message published so far.
    pub fn messages(&self) -> Vec<StockMessage> {
        self.lock().messages.clone()
    }

    /// Returns the most recent message for a product.
    pub fn last_for(&self, product_id: ProductId) -> Option<StockMessage> {
        self.lock()
            .messages
            .iter()
            .rev()
            .find(|m| m.product_id == product_id)
            .copied()
    }

    /// Forgets every recorded message.
    pub fn clear(&self) {
        self.lock().messages.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryPublisherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl AvailabilityPublisher for InMemoryPublisher {
    async fn publish(&self, message: &StockMessage) -> Result<(), PublishError> {
        let mut state = self.lock();
        if state.fail {
            return Err(PublishError::Broker("publisher configured to fail".into()));
        }
        state.messages.push(*message);
        Ok(())
    }
}

/// Publisher that emits each message as a structured log event.
#[derive(Debug, Clone)]
pub struct LoggingPublisher {
    channel: String,
}

impl LoggingPublisher {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl AvailabilityPublisher for LoggingPublisher {
    async fn publish(&self, message: &StockMessage) -> Result<(), PublishError> {
        tracing::info!(
            channel = %self.channel,
            product_id = %message.product_id,
            quantity = message.quantity,
            reserved = message.reserved,
            available = message.available,
            "stock availability"
        );
        Ok(())
    }
}

/// Publisher that sends each message with Redis `PUBLISH`.
#[cfg(feature = "redis")]
#[derive(Clone)]
pub struct RedisPublisher {
    conn: redis::aio::MultiplexedConnection,
    channel: String,
}

#[cfg(feature = "redis")]
impl RedisPublisher {
    /// Opens a multiplexed connection to `url`.
    pub async fn connect(url: &str, channel: impl Into<String>) -> Result<Self, PublishError> {
        let client = redis::Client::open(url).map_err(|e| PublishError::Broker(e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| PublishError::Broker(e.to_string()))?;
        Ok(Self {
            conn,
            channel: channel.into(),
        })
    }
}

#[cfg(feature = "redis")]
#[async_trait]
impl AvailabilityPublisher for RedisPublisher {
    #[tracing::instrument(skip(self, message), fields(channel = %self.channel, key = %message.key()))]
    async fn publish(&self, message: &StockMessage) -> Result<(), PublishError> {
        let payload = serde_json::to_string(message)?;
        let mut conn = self.conn.clone();
        redis::cmd("PUBLISH")
            .arg(&self.channel)
            .arg(payload)
            .query_async::<_, i64>(&mut conn)
            .await
            .map_err(|e| PublishError::Broker(e.to_string()))?;
        Ok(())
    }
}
