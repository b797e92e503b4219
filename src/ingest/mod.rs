//! Pulls observations from the provider and publishes canonical records.

pub mod error;

use crate::channel::ChannelPublisher;
use crate::config::ProviderSettings;
use crate::ingest::error::IngestError;
use crate::provider::{Observation, WeatherProvider};
use crate::types::record::{date_portion, CanonicalRecord, DATE_FIELD, STATION_FIELD};
use crate::types::window::DateWindow;
use indexmap::IndexMap;
use log::{error, info, warn};
use std::fmt;
use std::sync::Arc;

/// Summary of one successful ingest call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub window: DateWindow,
    /// Rows returned by the provider.
    pub observations: usize,
    /// Rows ignored because they lacked a date, station or datatype.
    pub skipped: usize,
    /// Channel sequence numbers, one per published record.
    pub published: Vec<String>,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Published {} records from {} observations for {}",
            self.published.len(),
            self.observations,
            self.window
        )?;
        if self.skipped > 0 {
            write!(f, " ({} skipped)", self.skipped)?;
        }
        Ok(())
    }
}

pub struct Ingestor {
    provider: Arc<dyn WeatherProvider>,
    publisher: Arc<dyn ChannelPublisher>,
    settings: ProviderSettings,
}

impl Ingestor {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        publisher: Arc<dyn ChannelPublisher>,
        settings: ProviderSettings,
    ) -> Self {
        Self {
            provider,
            publisher,
            settings,
        }
    }

    /// Fetches `window` once and publishes one record per distinct
    /// (date, station) in first-seen order. Nothing is published when the
    /// fetch fails or returns no usable rows.
    pub async fn ingest(&self, window: DateWindow) -> Result<IngestReport, IngestError> {
        let query = self.settings.query(window);
        info!(
            "Fetching {} observations for station {} in {}",
            query.dataset_id, query.station_id, window
        );

        let response = self.provider.fetch(&query).await.map_err(|e| {
            error!("Provider request failed: {}", e);
            IngestError::SourceUnavailable(e)
        })?;

        let observations = response.results.len();
        let (records, skipped) = fold_observations(&response.results);
        if records.is_empty() {
            warn!(
                "No usable observations for station {} in {} ({} rows returned)",
                query.station_id, window, observations
            );
            return Err(IngestError::EmptyResult {
                station: query.station_id,
                window,
            });
        }

        let total = records.len();
        let mut published = Vec::with_capacity(total);
        for record in &records {
            match self.publisher.publish(record).await {
                Ok(sequence) => published.push(sequence),
                Err(e) => {
                    error!(
                        "Publishing stopped after {} of {} records: {}",
                        published.len(),
                        total,
                        e
                    );
                    return Err(IngestError::Publish {
                        date: record.date().unwrap_or_default().to_string(),
                        station: record.station().unwrap_or_default().to_string(),
                        published: published.len(),
                        total,
                        source: e,
                    });
                }
            }
        }

        let report = IngestReport {
            window,
            observations,
            skipped,
            published,
        };
        info!("{}", report);
        Ok(report)
    }
}

/// Folds flat observations into one record per distinct (date, station),
/// keyed by datatype with the last value winning. Returns the records in
/// first-seen order together with the number of rows that were skipped.
pub fn fold_observations(observations: &[Observation]) -> (Vec<CanonicalRecord>, usize) {
    let mut grouped: IndexMap<(String, String), CanonicalRecord> = IndexMap::new();
    let mut skipped = 0;

    for observation in observations {
        let date = observation
            .date
            .as_deref()
            .map(date_portion)
            .filter(|d| !d.is_empty());
        let station = observation
            .station
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let datatype = observation.datatype.trim();

        let (Some(date), Some(station)) = (date, station) else {
            warn!("Skipping observation without date or station: {:?}", observation);
            skipped += 1;
            continue;
        };
        if datatype.is_empty() || datatype == DATE_FIELD || datatype == STATION_FIELD {
            warn!("Skipping observation with unusable datatype '{}'", datatype);
            skipped += 1;
            continue;
        }

        grouped
            .entry((date.to_string(), station.to_string()))
            .or_insert_with(|| CanonicalRecord::new(date, station))
            .insert(datatype, observation.value.clone());
    }

    (grouped.into_values().collect(), skipped)
}
