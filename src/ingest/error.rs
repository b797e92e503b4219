use crate::channel::error::ChannelError;
use crate::provider::error::ProviderError;
use crate::types::window::DateWindow;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Weather provider unavailable")]
    SourceUnavailable(#[from] ProviderError),

    #[error("No observations returned for station '{station}' in {window}")]
    EmptyResult { station: String, window: DateWindow },

    #[error("Failed to publish record for station '{station}' on {date} ({published} of {total} already published)")]
    Publish {
        date: String,
        station: String,
        published: usize,
        total: usize,
        #[source]
        source: ChannelError,
    },
}
