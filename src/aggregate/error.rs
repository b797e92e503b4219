use crate::storage::error::StorageError;
use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("Failed to enumerate stored records")]
    Listing(#[source] StorageError),

    #[error("No valid records found under '{prefix}' ({objects} objects scanned)")]
    EmptyDataset { prefix: String, objects: usize },

    #[error("Malformed object '{key}'")]
    MalformedObject {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to fetch object '{key}'")]
    Fetch {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),

    #[error("Failed to write consolidated dataset")]
    OutputWrite(#[source] StorageError),
}
