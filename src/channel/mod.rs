//! The durable channel between the ingestor and the sink.
//!
//! The channel service itself is external; this module defines the message
//! shape, the [`ChannelPublisher`] seam used by the ingestor, an in-process
//! [`memory_channel`] and a decoder for Kinesis-style delivery envelopes.

pub mod error;
pub mod kinesis;

use crate::channel::error::ChannelError;
use crate::config::CHANNEL_PARTITION_KEY;
use crate::types::record::CanonicalRecord;
use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One delivered unit: a single serialized [`CanonicalRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub partition_key: String,
    pub sequence_number: String,
    pub data: Bytes,
}

impl ChannelMessage {
    pub fn new(sequence_number: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            partition_key: CHANNEL_PARTITION_KEY.to_string(),
            sequence_number: sequence_number.into(),
            data: data.into(),
        }
    }

    /// Serializes `record` into a message on the fixed partition key.
    pub fn from_record(
        stream: &str,
        sequence_number: impl Into<String>,
        record: &CanonicalRecord,
    ) -> Result<Self, ChannelError> {
        let data = record.to_json_vec().map_err(|e| ChannelError::Encode {
            stream: stream.to_string(),
            source: e,
        })?;
        Ok(Self::new(sequence_number, data))
    }
}

#[async_trait]
pub trait ChannelPublisher: Send + Sync {
    /// Publishes one record and returns the sequence number assigned to it.
    async fn publish(&self, record: &CanonicalRecord) -> Result<String, ChannelError>;
}

/// Creates an in-process channel. Messages are delivered in publish order.
pub fn memory_channel(stream_name: impl Into<String>) -> (MemoryPublisher, MemorySubscription) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let publisher = MemoryPublisher {
        stream_name: stream_name.into(),
        sender,
        next_sequence: Arc::new(AtomicU64::new(1)),
    };
    (publisher, MemorySubscription { receiver })
}

#[derive(Clone)]
pub struct MemoryPublisher {
    stream_name: String,
    sender: mpsc::UnboundedSender<ChannelMessage>,
    next_sequence: Arc<AtomicU64>,
}

impl MemoryPublisher {
    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }
}

#[async_trait]
impl ChannelPublisher for MemoryPublisher {
    async fn publish(&self, record: &CanonicalRecord) -> Result<String, ChannelError> {
        let sequence = format!("{:020}", self.next_sequence.fetch_add(1, Ordering::SeqCst));
        let message = ChannelMessage::from_record(&self.stream_name, sequence.clone(), record)?;
        self.sender
            .send(message)
            .map_err(|_| ChannelError::Closed(self.stream_name.clone()))?;
        debug!("Published message {} on '{}'", sequence, self.stream_name);
        Ok(sequence)
    }
}

pub struct MemorySubscription {
    receiver: mpsc::UnboundedReceiver<ChannelMessage>,
}

impl MemorySubscription {
    /// Waits for the next message. Returns `None` once every publisher is dropped.
    pub async fn recv(&mut self) -> Option<ChannelMessage> {
        self.receiver.recv().await
    }

    /// Takes every message that is already buffered without waiting.
    pub fn drain_ready(&mut self) -> Vec<ChannelMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.receiver.try_recv() {
            messages.push(message);
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_channel_preserves_order() -> Result<(), ChannelError> {
        let (publisher, mut subscription) = memory_channel("weather-stream");
        let first = CanonicalRecord::new("2025-04-01", "S1");
        let second = CanonicalRecord::new("2025-04-02", "S1");

        let seq_a = publisher.publish(&first).await?;
        let seq_b = publisher.publish(&second).await?;
        assert!(seq_a < seq_b);

        let messages = subscription.drain_ready();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].partition_key, "weather-data");
        assert_eq!(messages[0].sequence_number, seq_a);
        assert_eq!(
            CanonicalRecord::from_json_slice(&messages[1].data).unwrap(),
            second
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_publish_after_close_fails() {
        let (publisher, subscription) = memory_channel("weather-stream");
        drop(subscription);
        let result = publisher
            .publish(&CanonicalRecord::new("2025-04-01", "S1"))
            .await;
        assert!(matches!(result, Err(ChannelError::Closed(name)) if name == "weather-stream"));
    }

    #[tokio::test]
    async fn test_recv_ends_when_publishers_drop() {
        let (publisher, mut subscription) = memory_channel("weather-stream");
        publisher
            .publish(&CanonicalRecord::new("2025-04-01", "S1"))
            .await
            .unwrap();
        drop(publisher);
        assert!(subscription.recv().await.is_some());
        assert!(subscription.recv().await.is_none());
    }
}
