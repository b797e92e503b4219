//! Wires the ingestor, sink and aggregator to one configuration and storage root.
//!
//! Each stage is invoked independently, typically by its own trigger, and
//! reports a [`StageOutcome`]. The coordinator never retries a stage.

pub mod layout;

use crate::aggregate::{AggregateReport, Aggregator};
use crate::channel::kinesis::KinesisEvent;
use crate::channel::{ChannelMessage, ChannelPublisher, MemorySubscription};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::ingest::{IngestReport, Ingestor};
use crate::pipeline::layout::ObjectLayout;
use crate::provider::noaa::NoaaClient;
use crate::provider::WeatherProvider;
use crate::sink::{ChannelSink, SinkReport};
use crate::storage::RecordStore;
use crate::types::outcome::StageOutcome;
use crate::types::window::DateWindow;
use log::{error, info};
use std::sync::Arc;

pub struct Pipeline {
    config: PipelineConfig,
    store: RecordStore,
    ingestor: Ingestor,
    sink: ChannelSink,
    aggregator: Aggregator,
}

impl Pipeline {
    /// Assembles a pipeline from explicit collaborators.
    pub fn new(
        config: PipelineConfig,
        store: RecordStore,
        provider: Arc<dyn WeatherProvider>,
        publisher: Arc<dyn ChannelPublisher>,
    ) -> Self {
        let layout = ObjectLayout::from_config(&config);
        let ingestor = Ingestor::new(provider, publisher, config.provider.clone());
        let sink = ChannelSink::new(store.clone(), layout.clone());
        let aggregator = Aggregator::new(store.clone(), layout, config.fetch_concurrency);
        Self {
            config,
            store,
            ingestor,
            sink,
            aggregator,
        }
    }

    /// Uses the NOAA client and opens the storage named by `config.storage_url`.
    pub async fn from_config(
        config: PipelineConfig,
        publisher: Arc<dyn ChannelPublisher>,
    ) -> Result<Self, PipelineError> {
        let store = RecordStore::from_url(config.storage_url.as_deref()).await?;
        let provider = Arc::new(NoaaClient::new(&config.provider));
        Ok(Self::new(config, store, provider, publisher))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn layout(&self) -> ObjectLayout {
        ObjectLayout::from_config(&self.config)
    }

    /// Ingests `window`, or the current UTC day when `None`.
    pub async fn run_ingest(
        &self,
        window: Option<DateWindow>,
    ) -> Result<IngestReport, PipelineError> {
        Ok(self.ingestor.ingest(window.unwrap_or_default()).await?)
    }

    pub async fn ingest(&self, window: Option<DateWindow>) -> StageOutcome {
        report("ingest", self.run_ingest(window).await)
    }

    /// Stores already-delivered messages. Per-message failures are part of the
    /// report, so this stage itself always succeeds.
    pub async fn sink(&self, messages: Vec<ChannelMessage>) -> StageOutcome {
        let sink_report = self.sink.handle_batch(messages).await;
        report("sink", Ok::<SinkReport, PipelineError>(sink_report))
    }

    /// Stores the records of a raw Kinesis-style delivery body.
    pub async fn sink_event(&self, body: &[u8]) -> StageOutcome {
        let result = match KinesisEvent::from_slice(body) {
            Ok(event) => Ok(self.sink.handle_kinesis_event(&event).await),
            Err(e) => Err(PipelineError::from(e)),
        };
        report("sink", result)
    }

    /// Stores every message from `subscription` until all publishers are gone.
    pub async fn drain(&self, subscription: &mut MemorySubscription) -> StageOutcome {
        let sink_report = self.sink.drain(subscription).await;
        report("sink", Ok::<SinkReport, PipelineError>(sink_report))
    }

    pub async fn run_aggregate(&self) -> Result<AggregateReport, PipelineError> {
        Ok(self.aggregator.run().await?)
    }

    pub async fn aggregate(&self) -> StageOutcome {
        report("aggregate", self.run_aggregate().await)
    }
}

fn report<T: std::fmt::Display>(stage: &str, result: Result<T, PipelineError>) -> StageOutcome {
    let outcome = StageOutcome::from(result);
    if outcome.is_success() {
        info!("{} stage finished: {}", stage, outcome);
    } else {
        error!("{} stage failed: {}", stage, outcome);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::memory_channel;
    use crate::error::ErrorKind;
    use crate::provider::error::ProviderError;
    use crate::provider::query::ProviderQuery;
    use crate::provider::{Observation, ProviderResponse};
    use async_trait::async_trait;
    use chrono::NaiveDate;

    struct StaticProvider(Vec<Observation>);

    #[async_trait]
    impl WeatherProvider for StaticProvider {
        async fn fetch(&self, _query: &ProviderQuery) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                metadata: None,
                results: self.0.clone(),
            })
        }
    }

    fn window() -> Option<DateWindow> {
        Some(DateWindow::single(NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()))
    }

    #[tokio::test]
    async fn test_stages_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
        let provider = Arc::new(StaticProvider(vec![
            Observation::new("2025-04-01T00:00:00", "S1", "TMAX", 70),
            Observation::new("2025-04-01T00:00:00", "S1", "TMIN", 50),
            Observation::new("2025-04-01T00:00:00", "S2", "TMAX", 66),
        ]));
        let (publisher, mut subscription) = memory_channel("weather-stream");
        let store = RecordStore::in_memory();
        let pipeline = Pipeline::new(
            PipelineConfig::default(),
            store.clone(),
            provider,
            Arc::new(publisher),
        );

        let ingest = pipeline.ingest(window()).await;
        assert_eq!(ingest.status_code, 200, "{}", ingest);

        let sink = pipeline.sink(subscription.drain_ready()).await;
        assert_eq!(sink.status_code, 200);
        assert!(sink.message.starts_with("Stored 2 of 2 records"));

        let aggregate = pipeline.aggregate().await;
        assert_eq!(aggregate.status_code, 200, "{}", aggregate);

        let csv = store.get(&pipeline.layout().output_key()).await?;
        assert_eq!(
            std::str::from_utf8(&csv)?,
            "date,station,TMAX,TMIN\n2025-04-01,S1,70,50\n2025-04-01,S2,66,\n"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_failures_map_to_status_codes() {
        let (publisher, _subscription) = memory_channel("weather-stream");
        let pipeline = Pipeline::new(
            PipelineConfig::default(),
            RecordStore::in_memory(),
            Arc::new(StaticProvider(Vec::new())),
            Arc::new(publisher),
        );

        let ingest = pipeline.ingest(window()).await;
        assert_eq!(ingest.status_code, 400);
        assert_eq!(ingest.kind, Some(ErrorKind::EmptyResult));

        let aggregate = pipeline.aggregate().await;
        assert_eq!(aggregate.status_code, 400);
        assert_eq!(aggregate.kind, Some(ErrorKind::EmptyDataset));

        let sink = pipeline.sink_event(b"not an envelope").await;
        assert_eq!(sink.status_code, 500);
        assert_eq!(sink.kind, Some(ErrorKind::MalformedRecord));
    }

    #[tokio::test]
    async fn test_sink_event_and_drain() -> Result<(), Box<dyn std::error::Error>> {
        let (publisher, mut subscription) = memory_channel("weather-stream");
        let store = RecordStore::in_memory();
        let pipeline = Pipeline::new(
            PipelineConfig::builder().prefix("noaa").build(),
            store.clone(),
            Arc::new(StaticProvider(vec![Observation::new(
                "2025-04-01", "S1", "PRCP", 0.1,
            )])),
            Arc::new(publisher),
        );

        pipeline.run_ingest(window()).await?;
        let delivered = subscription.drain_ready();
        let body = serde_json::to_vec(&KinesisEvent::from_messages(&delivered))?;
        assert!(pipeline.sink_event(&body).await.is_success());

        // A separate channel whose only publisher is dropped before draining.
        let (replay, mut replayed) = memory_channel("weather-stream");
        for message in &delivered {
            let record = crate::types::record::CanonicalRecord::from_json_slice(&message.data)?;
            replay.publish(&record).await?;
        }
        drop(replay);
        let outcome = pipeline.drain(&mut replayed).await;
        assert!(outcome.message.starts_with("Stored 1 of 1 records"));

        let partition = object_store::path::Path::from("noaa/2025-04-01");
        assert_eq!(store.list_objects(&partition).await?.len(), 2);
        Ok(())
    }
}
