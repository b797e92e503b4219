use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel '{0}' is closed")]
    Closed(String),

    #[error("Failed to encode record for channel '{stream}'")]
    Encode {
        stream: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse delivery envelope")]
    Envelope(#[from] serde_json::Error),
}
