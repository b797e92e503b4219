mod aggregate;
mod channel;
mod config;
mod error;
mod ingest;
mod pipeline;
mod provider;
mod sink;
mod storage;
mod types;
mod utils;

pub use config::*;
pub use error::{ErrorKind, PipelineError};
pub use pipeline::Pipeline;

pub use types::outcome::StageOutcome;
pub use types::record::*;
pub use types::window::DateWindow;

pub use provider::noaa::NoaaClient;
pub use provider::query::ProviderQuery;
pub use provider::{Observation, ProviderResponse, ResponseMetadata, ResultSet, WeatherProvider};

pub use channel::kinesis::{KinesisEvent, KinesisEventRecord, KinesisPayload};
pub use channel::{memory_channel, ChannelMessage, ChannelPublisher, MemoryPublisher, MemorySubscription};

pub use storage::token::{TokenGenerator, UniquenessToken};
pub use storage::{RecordStore, CSV_CONTENT_TYPE, JSON_CONTENT_TYPE};
pub use pipeline::layout::*;

pub use ingest::{fold_observations, IngestReport, Ingestor};
pub use sink::{ChannelSink, SinkReport};
pub use aggregate::dataset::{CleaningStats, ConsolidatedDataset, StoredRecord};
pub use aggregate::{AggregateReport, Aggregator, Scan};

pub use aggregate::error::AggregateError;
pub use channel::error::ChannelError;
pub use ingest::error::IngestError;
pub use provider::error::ProviderError;
pub use sink::error::SinkError;
pub use storage::error::StorageError;
