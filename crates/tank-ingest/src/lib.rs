//! Message sources and the ingestion boundary
//!
//! Sources deliver raw topic/payload pairs one at a time. The normalizer
//! turns them into measurements and the ingestor writes those to the
//! store, dropping malformed messages without stopping the stream.

pub mod ingestor;
pub mod mqtt;
pub mod normalizer;
pub mod simulator;

pub use ingestor::*;
pub use mqtt::*;
pub use normalizer::*;
pub use simulator::*;

use chrono::{DateTime, Utc};
use tank_core::StoreError;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Source error: {0}")]
    SourceError(String),

    #[error("Communication error: {0}")]
    CommunicationError(String),
}

impl IngestError {
    /// Errors that only drop the current message
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            IngestError::InvalidPayload(_)
                | IngestError::UnknownChannel(_)
                | IngestError::UnknownTopic(_)
        )
    }
}

pub type IngestResult<T> = Result<T, IngestError>;

/// A message as delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub topic: String,
    pub payload: String,
    pub received_at: DateTime<Utc>,
}

impl RawMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }

    pub fn received_at(mut self, ts: DateTime<Utc>) -> Self {
        self.received_at = ts;
        self
    }
}

/// Trait for all message sources
#[async_trait::async_trait]
pub trait MessageSource: Send {
    /// Source name/identifier
    fn name(&self) -> &str;

    /// Connect and start receiving
    async fn start(&mut self) -> IngestResult<()>;

    /// Stop receiving and release resources
    async fn stop(&mut self) -> IngestResult<()>;

    /// Wait for the next message
    async fn next_message(&mut self) -> IngestResult<RawMessage>;

    /// Check if source is currently active
    fn is_active(&self) -> bool;
}

pub type MessageReceiver = mpsc::Receiver<RawMessage>;
pub type MessageSender = mpsc::Sender<RawMessage>;

/// Create a new message channel with specified buffer size
pub fn create_message_channel(buffer_size: usize) -> (MessageSender, MessageReceiver) {
    mpsc::channel(buffer_size)
}
