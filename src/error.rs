use crate::aggregate::error::AggregateError;
use crate::channel::error::ChannelError;
use crate::ingest::error::IngestError;
use crate::sink::error::SinkError;
use crate::storage::error::StorageError;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error("Required environment variable '{0}' is not set")]
    MissingEnvVar(&'static str),

    #[error("Environment variable '{name}' has invalid value '{value}'")]
    InvalidEnvVar { name: &'static str, value: String },
}

/// Coarse classification of every failure the pipeline can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The provider was unreachable, answered with an error status or an undecodable body.
    SourceUnavailable,
    /// The provider answered successfully but without any observations.
    EmptyResult,
    /// A channel message or stored object could not be parsed as a record.
    MalformedRecord,
    /// Writing to the channel or to storage failed.
    WriteFailure,
    /// No stored record survived cleaning.
    EmptyDataset,
    /// Storage could not be configured, listed or read.
    StorageUnavailable,
    Configuration,
}

impl ErrorKind {
    /// HTTP-style status code reported in a [`crate::StageOutcome`].
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::EmptyResult | ErrorKind::EmptyDataset => 400,
            _ => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::SourceUnavailable => "SourceUnavailable",
            ErrorKind::EmptyResult => "EmptyResult",
            ErrorKind::MalformedRecord => "MalformedRecord",
            ErrorKind::WriteFailure => "WriteFailure",
            ErrorKind::EmptyDataset => "EmptyDataset",
            ErrorKind::StorageUnavailable => "StorageUnavailable",
            ErrorKind::Configuration => "Configuration",
        };
        f.write_str(name)
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Ingest(IngestError::SourceUnavailable(_)) => ErrorKind::SourceUnavailable,
            PipelineError::Ingest(IngestError::EmptyResult { .. }) => ErrorKind::EmptyResult,
            PipelineError::Ingest(IngestError::Publish { .. }) => ErrorKind::WriteFailure,
            PipelineError::Channel(ChannelError::Envelope(_)) => ErrorKind::MalformedRecord,
            PipelineError::Channel(_) => ErrorKind::WriteFailure,
            PipelineError::Storage(StorageError::Write { .. })
            | PipelineError::Storage(StorageError::AlreadyExists { .. }) => ErrorKind::WriteFailure,
            PipelineError::Storage(_) => ErrorKind::StorageUnavailable,
            PipelineError::Sink(SinkError::MalformedRecord { .. })
            | PipelineError::Sink(SinkError::MalformedPayload { .. }) => ErrorKind::MalformedRecord,
            PipelineError::Sink(_) => ErrorKind::WriteFailure,
            PipelineError::Aggregate(AggregateError::EmptyDataset { .. }) => ErrorKind::EmptyDataset,
            PipelineError::Aggregate(AggregateError::MalformedObject { .. }) => {
                ErrorKind::MalformedRecord
            }
            PipelineError::Aggregate(AggregateError::Listing(_))
            | PipelineError::Aggregate(AggregateError::Fetch { .. }) => {
                ErrorKind::StorageUnavailable
            }
            PipelineError::Aggregate(_) => ErrorKind::WriteFailure,
            PipelineError::MissingEnvVar(_) | PipelineError::InvalidEnvVar { .. } => {
                ErrorKind::Configuration
            }
        }
    }
}
