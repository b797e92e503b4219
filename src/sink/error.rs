use crate::storage::error::StorageError;
use thiserror::Error;

/// A failure that affected a single delivered message. The sink records these
/// in its report and moves on to the next message.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Malformed record in message {sequence}")]
    MalformedRecord {
        sequence: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Undecodable payload in message {sequence}")]
    MalformedPayload {
        sequence: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("Failed to encode record from message {sequence}")]
    Encode {
        sequence: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to store record from message {sequence}")]
    WriteFailure {
        sequence: String,
        #[source]
        source: StorageError,
    },

    #[error("Gave up storing message {sequence} after {attempts} key collisions (last key '{last_key}')")]
    KeyCollision {
        sequence: String,
        attempts: usize,
        last_key: String,
    },
}
