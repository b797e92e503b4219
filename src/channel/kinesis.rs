//! Kinesis-style delivery envelopes, as handed to a stream consumer function:
//! `{"Records": [{"kinesis": {"data": "<base64>", ...}}]}`.

use crate::channel::error::ChannelError;
use crate::channel::ChannelMessage;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KinesisEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<KinesisEventRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KinesisEventRecord {
    pub kinesis: KinesisPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KinesisPayload {
    #[serde(default)]
    pub partition_key: String,
    #[serde(default)]
    pub sequence_number: String,
    /// Base64-encoded message body.
    pub data: String,
}

impl KinesisEvent {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ChannelError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Wraps already-delivered messages into an envelope.
    pub fn from_messages(messages: &[ChannelMessage]) -> Self {
        let records = messages
            .iter()
            .map(|message| KinesisEventRecord {
                kinesis: KinesisPayload {
                    partition_key: message.partition_key.clone(),
                    sequence_number: message.sequence_number.clone(),
                    data: STANDARD.encode(&message.data),
                },
            })
            .collect();
        Self { records }
    }
}

impl KinesisPayload {
    /// Decodes the base64 body into a [`ChannelMessage`].
    pub fn decode(&self) -> Result<ChannelMessage, base64::DecodeError> {
        let data = STANDARD.decode(self.data.as_bytes())?;
        Ok(ChannelMessage {
            partition_key: self.partition_key.clone(),
            sequence_number: self.sequence_number.clone(),
            data: data.into(),
        })
    }
}
