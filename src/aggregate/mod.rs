//! Consolidates every stored record into one cleaned CSV artifact.
//!
//! Objects are fetched with bounded concurrency, but results are consumed in
//! listing order and the output depends only on the set of stored objects, so
//! repeated runs over the same objects produce byte-identical output.

pub mod dataset;
pub mod error;

use crate::aggregate::dataset::{ConsolidatedDataset, StoredRecord};
use crate::aggregate::error::AggregateError;
use crate::pipeline::layout::ObjectLayout;
use crate::storage::{RecordStore, CSV_CONTENT_TYPE};
use crate::types::record::CanonicalRecord;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use log::{debug, info, warn};
use object_store::path::Path;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateReport {
    pub objects_seen: usize,
    pub parsed: usize,
    pub malformed: usize,
    pub dropped_invalid: usize,
    pub duplicates_collapsed: usize,
    pub rows_written: usize,
    pub output_key: Path,
}

impl fmt::Display for AggregateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Wrote {} rows to {} ({} objects, {} malformed, {} invalid, {} duplicates)",
            self.rows_written,
            self.output_key,
            self.objects_seen,
            self.malformed,
            self.dropped_invalid,
            self.duplicates_collapsed
        )
    }
}

/// Result of reading every record object below the prefix.
#[derive(Debug, Clone, Default)]
pub struct Scan {
    pub records: Vec<StoredRecord>,
    pub objects_seen: usize,
    pub malformed: usize,
}

pub struct Aggregator {
    store: RecordStore,
    layout: ObjectLayout,
    fetch_concurrency: usize,
}

impl Aggregator {
    pub fn new(store: RecordStore, layout: ObjectLayout, fetch_concurrency: usize) -> Self {
        Self {
            store,
            layout,
            fetch_concurrency: fetch_concurrency.max(1),
        }
    }

    /// Keys of all record objects, partition by partition. The output
    /// partition and objects outside any partition are skipped.
    pub async fn list_record_keys(&self) -> Result<Vec<Path>, AggregateError> {
        let mut partitions = self
            .store
            .list_prefixes(self.layout.prefix())
            .await
            .map_err(AggregateError::Listing)?;
        partitions.retain(|p| !self.layout.is_output_partition(p));
        partitions.sort();

        let mut keys = Vec::new();
        for partition in &partitions {
            let mut objects: Vec<Path> = self
                .store
                .list_objects(partition)
                .await
                .map_err(AggregateError::Listing)?
                .into_iter()
                .map(|meta| meta.location)
                .filter(|key| self.layout.is_record_object(key))
                .collect();
            objects.sort();
            debug!("Found {} objects in {}", objects.len(), partition);
            keys.extend(objects);
        }
        Ok(keys)
    }

    /// Fetches and parses every record object. Objects that cannot be read or
    /// parsed are logged and counted, never fatal.
    pub async fn scan(&self) -> Result<Scan, AggregateError> {
        let keys = self.list_record_keys().await?;
        let objects_seen = keys.len();

        let results: Vec<_> = stream::iter(keys)
            .map(|key| async move {
                let result = self.fetch_record(&key).await;
                (key, result)
            })
            .buffered(self.fetch_concurrency)
            .collect()
            .await;

        let mut scan = Scan {
            objects_seen,
            ..Default::default()
        };
        for (key, result) in results {
            match result {
                Ok(record) => scan.records.push(StoredRecord {
                    token: self.layout.token_of(&key),
                    key,
                    record,
                }),
                Err(e) => {
                    warn!("Skipping {}: {}", key, e);
                    scan.malformed += 1;
                }
            }
        }
        Ok(scan)
    }

    async fn fetch_record(&self, key: &Path) -> Result<CanonicalRecord, AggregateError> {
        let body = self
            .store
            .get(key)
            .await
            .map_err(|e| AggregateError::Fetch {
                key: key.to_string(),
                source: e,
            })?;
        CanonicalRecord::from_json_slice(&body).map_err(|e| AggregateError::MalformedObject {
            key: key.to_string(),
            source: e,
        })
    }

    /// Scans, cleans and writes the consolidated dataset in a single put.
    /// Nothing is written when no record survives cleaning.
    pub async fn run(&self) -> Result<AggregateReport, AggregateError> {
        let scan = self.scan().await?;
        let parsed = scan.records.len();
        let (dataset, stats) = ConsolidatedDataset::consolidate(scan.records);

        if dataset.is_empty() {
            warn!(
                "No valid records under {} ({} objects, {} malformed)",
                self.layout.prefix(),
                scan.objects_seen,
                scan.malformed
            );
            return Err(AggregateError::EmptyDataset {
                prefix: self.layout.prefix().to_string(),
                objects: scan.objects_seen,
            });
        }

        let csv = dataset.to_csv_bytes()?;
        let output_key = self.layout.output_key();
        self.store
            .overwrite(&output_key, Bytes::from(csv), CSV_CONTENT_TYPE)
            .await
            .map_err(AggregateError::OutputWrite)?;

        let report = AggregateReport {
            objects_seen: scan.objects_seen,
            parsed,
            malformed: scan.malformed,
            dropped_invalid: stats.dropped_invalid,
            duplicates_collapsed: stats.duplicates_collapsed,
            rows_written: dataset.len(),
            output_key,
        };
        info!("{}", report);
        Ok(report)
    }
}
