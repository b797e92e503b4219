//! Object key and partition naming shared by the sink and the aggregator.
//!
//! ```text
//! <prefix>/<partition>/<tag>_<token>.json     one stored record
//! <prefix>/cleaned/<dataset>.csv              the consolidated dataset
//! ```
//!
//! The partition is the calendar-date portion of the record's `date`
//! (`unknown` when it has none); the tag is the record's `datatype`
//! field or the configured default.

use crate::config::PipelineConfig;
use crate::storage::token::UniquenessToken;
use crate::types::record::{date_portion, CanonicalRecord};
use object_store::path::Path;

pub const RECORD_EXTENSION: &str = "json";
pub const OUTPUT_PARTITION: &str = "cleaned";
pub const UNKNOWN_PARTITION: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLayout {
    prefix: Path,
    dataset_name: String,
    default_tag: String,
}

impl ObjectLayout {
    pub fn new(
        prefix: &str,
        dataset_name: impl Into<String>,
        default_tag: impl Into<String>,
    ) -> Self {
        Self {
            prefix: Path::from(prefix),
            dataset_name: dataset_name.into(),
            default_tag: default_tag.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.prefix, &config.dataset_name, &config.default_tag)
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn partition_for(&self, record: &CanonicalRecord) -> String {
        record
            .date()
            .map(date_portion)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| UNKNOWN_PARTITION.to_string())
    }

    pub fn tag_for<'a>(&'a self, record: &'a CanonicalRecord) -> &'a str {
        record.datatype().unwrap_or(&self.default_tag)
    }

    /// Key for one stored record. Path parts are percent-encoded, so a
    /// partition or tag containing `/` cannot escape its directory.
    pub fn record_key(&self, partition: &str, tag: &str, token: UniquenessToken) -> Path {
        self.prefix
            .child(partition)
            .child(format!("{}_{}.{}", tag, token, RECORD_EXTENSION))
    }

    /// Fixed location of the consolidated dataset.
    pub fn output_key(&self) -> Path {
        self.prefix
            .child(OUTPUT_PARTITION)
            .child(format!("{}.csv", self.dataset_name))
    }

    /// True for the partition holding the consolidated output, which the
    /// aggregator must not read back as input.
    pub fn is_output_partition(&self, partition: &Path) -> bool {
        partition.filename() == Some(OUTPUT_PARTITION)
    }

    pub fn is_record_object(&self, key: &Path) -> bool {
        key.extension() == Some(RECORD_EXTENSION)
    }

    /// Extracts the uniqueness token from a record key, if it has one.
    pub fn token_of(&self, key: &Path) -> Option<UniquenessToken> {
        let filename = key.filename()?;
        let stem = filename.strip_suffix(RECORD_EXTENSION)?.strip_suffix('.')?;
        let (_, token) = stem.rsplit_once('_')?;
        token.parse().ok()
    }
}

impl Default for ObjectLayout {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}
