//! Consumes records from the channel and persists each one as its own object.
//!
//! Writes are create-only with a fresh uniqueness token per write, so a
//! redelivered message produces a second object instead of replacing the first.
//! Failures are per message: they are logged, counted in the [`SinkReport`]
//! and never stop the remaining messages from being processed.

pub mod error;

use crate::channel::kinesis::KinesisEvent;
use crate::channel::{ChannelMessage, MemorySubscription};
use crate::pipeline::layout::ObjectLayout;
use crate::sink::error::SinkError;
use crate::storage::error::StorageError;
use crate::storage::token::TokenGenerator;
use crate::storage::{RecordStore, JSON_CONTENT_TYPE};
use crate::types::record::CanonicalRecord;
use bytes::Bytes;
use log::{error, info, warn};
use object_store::path::Path;
use std::fmt;

/// Fresh tokens drawn for one message before giving up on key collisions.
const MAX_KEY_ATTEMPTS: usize = 3;

/// Per-invocation summary of what the sink did.
#[derive(Debug, Clone, Default)]
pub struct SinkReport {
    pub received: usize,
    pub stored: Vec<Path>,
    pub malformed: usize,
    pub write_failures: usize,
    /// One human-readable line per failed message.
    pub failures: Vec<String>,
}

impl SinkReport {
    pub fn failed(&self) -> usize {
        self.malformed + self.write_failures
    }

    fn record(&mut self, result: Result<Path, SinkError>) {
        self.received += 1;
        match result {
            Ok(key) => self.stored.push(key),
            Err(e) => {
                match e {
                    SinkError::MalformedRecord { .. } | SinkError::MalformedPayload { .. } => {
                        self.malformed += 1
                    }
                    _ => self.write_failures += 1,
                }
                error!("Skipping message: {}", describe(&e));
                self.failures.push(describe(&e));
            }
        }
    }
}

impl fmt::Display for SinkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stored {} of {} records ({} malformed, {} write failures)",
            self.stored.len(),
            self.received,
            self.malformed,
            self.write_failures
        )
    }
}

fn describe(error: &SinkError) -> String {
    match std::error::Error::source(error) {
        Some(source) => format!("{}: {}", error, source),
        None => error.to_string(),
    }
}

pub struct ChannelSink {
    store: RecordStore,
    layout: ObjectLayout,
    tokens: TokenGenerator,
}

impl ChannelSink {
    pub fn new(store: RecordStore, layout: ObjectLayout) -> Self {
        Self {
            store,
            layout,
            tokens: TokenGenerator::new(),
        }
    }

    /// Decodes and stores one message, returning the key it was written to.
    pub async fn handle_message(&self, message: &ChannelMessage) -> Result<Path, SinkError> {
        let sequence = &message.sequence_number;
        let record = CanonicalRecord::from_json_slice(&message.data).map_err(|e| {
            SinkError::MalformedRecord {
                sequence: sequence.clone(),
                source: e,
            }
        })?;
        if !record.has_mandatory_fields() {
            warn!(
                "Message {} lacks date or station; storing under fallback partition",
                sequence
            );
        }

        let body = Bytes::from(record.to_json_vec().map_err(|e| SinkError::Encode {
            sequence: sequence.clone(),
            source: e,
        })?);
        let partition = self.layout.partition_for(&record);
        let tag = self.layout.tag_for(&record);

        let mut last_key = None;
        for _ in 0..MAX_KEY_ATTEMPTS {
            let key = self
                .layout
                .record_key(&partition, tag, self.tokens.next_token());
            match self.store.create(&key, body.clone(), JSON_CONTENT_TYPE).await {
                Ok(()) => {
                    info!("Stored message {} at {}", sequence, key);
                    return Ok(key);
                }
                Err(StorageError::AlreadyExists { .. }) => {
                    warn!("Key {} already exists, drawing a new token", key);
                    last_key = Some(key);
                }
                Err(e) => {
                    return Err(SinkError::WriteFailure {
                        sequence: sequence.clone(),
                        source: e,
                    })
                }
            }
        }

        Err(SinkError::KeyCollision {
            sequence: sequence.clone(),
            attempts: MAX_KEY_ATTEMPTS,
            last_key: last_key.map(|k| k.to_string()).unwrap_or_default(),
        })
    }

    /// Processes messages one at a time in delivery order.
    pub async fn handle_batch<I>(&self, messages: I) -> SinkReport
    where
        I: IntoIterator<Item = ChannelMessage>,
    {
        let mut report = SinkReport::default();
        for message in messages {
            report.record(self.handle_message(&message).await);
        }
        info!("{}", report);
        report
    }

    /// Processes a Kinesis-style envelope. Records whose payload is not valid
    /// base64 count as malformed.
    pub async fn handle_kinesis_event(&self, event: &KinesisEvent) -> SinkReport {
        let mut report = SinkReport::default();
        for entry in &event.records {
            let result = match entry.kinesis.decode() {
                Ok(message) => self.handle_message(&message).await,
                Err(e) => Err(SinkError::MalformedPayload {
                    sequence: entry.kinesis.sequence_number.clone(),
                    source: e,
                }),
            };
            report.record(result);
        }
        info!("{}", report);
        report
    }

    /// Consumes the subscription until every publisher has been dropped.
    pub async fn drain(&self, subscription: &mut MemorySubscription) -> SinkReport {
        let mut report = SinkReport::default();
        while let Some(message) = subscription.recv().await {
            report.record(self.handle_message(&message).await);
        }
        info!("{}", report);
        report
    }
}
