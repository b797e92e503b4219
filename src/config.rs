//! Explicit configuration passed into every pipeline component.
//!
//! Nothing in the crate reads process-wide state except [`PipelineConfig::from_env`],
//! which is the single place environment variables are consulted.

use crate::error::PipelineError;
use crate::provider::query::ProviderQuery;
use crate::types::window::DateWindow;
use bon::Builder;
use std::str::FromStr;

pub const DEFAULT_API_URL: &str = "https://www.ncdc.noaa.gov/cdo-web/api/v2/data";
pub const DEFAULT_DATASET_ID: &str = "GHCND";
pub const DEFAULT_STATION_ID: &str = "GHCND:USW00023234";
pub const DEFAULT_LIMIT: u32 = 1000;
pub const DEFAULT_UNITS: &str = "standard";

pub const DEFAULT_STREAM_NAME: &str = "weather-stream";
/// All records travel on one logical stream, so the channel partition key is fixed.
pub const CHANNEL_PARTITION_KEY: &str = "weather-data";

pub const DEFAULT_PREFIX: &str = "weather_data";
pub const DEFAULT_DATASET_NAME: &str = "cleaned_weather_dataset";
pub const DEFAULT_TAG: &str = "weather";
pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;

/// Settings for the weather provider. Recognized query options are
/// `datasetid`, `stationid`, `startdate`, `enddate`, `limit` and `units`;
/// the date options come from the [`DateWindow`] of each call.
///
/// ```
/// use weatherflow::ProviderSettings;
///
/// let settings = ProviderSettings::builder()
///     .token("secret")
///     .station_id("GHCND:USW00094728")
///     .build();
/// assert_eq!(settings.dataset_id, "GHCND");
/// assert_eq!(settings.limit, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct ProviderSettings {
    #[builder(into, default = DEFAULT_API_URL.to_string())]
    pub api_url: String,
    /// Sent as the `token` request header when present.
    #[builder(into)]
    pub token: Option<String>,
    #[builder(into, default = DEFAULT_DATASET_ID.to_string())]
    pub dataset_id: String,
    #[builder(into, default = DEFAULT_STATION_ID.to_string())]
    pub station_id: String,
    #[builder(default = DEFAULT_LIMIT)]
    pub limit: u32,
    #[builder(into, default = DEFAULT_UNITS.to_string())]
    pub units: String,
}

impl ProviderSettings {
    /// Builds the provider query for one window.
    pub fn query(&self, window: DateWindow) -> ProviderQuery {
        ProviderQuery {
            dataset_id: self.dataset_id.clone(),
            station_id: self.station_id.clone(),
            window,
            limit: self.limit,
            units: self.units.clone(),
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Configuration for the whole pipeline.
///
/// `storage_url` selects the object store: `s3://bucket[/root]`,
/// `file:///path`, a bare absolute path, or `memory://`. When unset, a
/// directory under the platform data directory is used.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct PipelineConfig {
    #[builder(into)]
    pub storage_url: Option<String>,
    /// Prefix under which partitions and the `cleaned/` output live.
    #[builder(into, default = DEFAULT_PREFIX.to_string())]
    pub prefix: String,
    #[builder(into, default = DEFAULT_STREAM_NAME.to_string())]
    pub stream_name: String,
    #[builder(into, default = DEFAULT_DATASET_NAME.to_string())]
    pub dataset_name: String,
    /// Tag used in object keys for records without a `datatype` field.
    #[builder(into, default = DEFAULT_TAG.to_string())]
    pub default_tag: String,
    /// Maximum number of stored objects fetched concurrently by the aggregator.
    #[builder(default = DEFAULT_FETCH_CONCURRENCY)]
    pub fetch_concurrency: usize,
    #[builder(default)]
    pub provider: ProviderSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PipelineConfig {
    /// Reads the configuration from environment variables.
    ///
    /// | variable | default |
    /// |---|---|
    /// | `NOAA_API_TOKEN` | required |
    /// | `NOAA_API_URL` | [`DEFAULT_API_URL`] |
    /// | `NOAA_DATASET_ID` | [`DEFAULT_DATASET_ID`] |
    /// | `NOAA_STATION_ID` | [`DEFAULT_STATION_ID`] |
    /// | `NOAA_LIMIT` | [`DEFAULT_LIMIT`] |
    /// | `NOAA_UNITS` | [`DEFAULT_UNITS`] |
    /// | `WEATHER_STORAGE_URL` | local data directory |
    /// | `WEATHER_PREFIX` | [`DEFAULT_PREFIX`] |
    /// | `KINESIS_STREAM_NAME` | [`DEFAULT_STREAM_NAME`] |
    /// | `WEATHER_DATASET_NAME` | [`DEFAULT_DATASET_NAME`] |
    /// | `WEATHER_FETCH_CONCURRENCY` | [`DEFAULT_FETCH_CONCURRENCY`] |
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`PipelineConfig::from_env`] but reads values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("NOAA_API_TOKEN")
            .filter(|t| !t.is_empty())
            .ok_or(PipelineError::MissingEnvVar("NOAA_API_TOKEN"))?;

        let provider = ProviderSettings::builder()
            .token(token)
            .api_url(lookup("NOAA_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()))
            .dataset_id(lookup("NOAA_DATASET_ID").unwrap_or_else(|| DEFAULT_DATASET_ID.to_string()))
            .station_id(lookup("NOAA_STATION_ID").unwrap_or_else(|| DEFAULT_STATION_ID.to_string()))
            .limit(parse_var(&lookup, "NOAA_LIMIT", DEFAULT_LIMIT)?)
            .units(lookup("NOAA_UNITS").unwrap_or_else(|| DEFAULT_UNITS.to_string()))
            .build();

        Ok(Self::builder()
            .maybe_storage_url(lookup("WEATHER_STORAGE_URL"))
            .prefix(lookup("WEATHER_PREFIX").unwrap_or_else(|| DEFAULT_PREFIX.to_string()))
            .stream_name(
                lookup("KINESIS_STREAM_NAME").unwrap_or_else(|| DEFAULT_STREAM_NAME.to_string()),
            )
            .dataset_name(
                lookup("WEATHER_DATASET_NAME").unwrap_or_else(|| DEFAULT_DATASET_NAME.to_string()),
            )
            .fetch_concurrency(parse_var(
                &lookup,
                "WEATHER_FETCH_CONCURRENCY",
                DEFAULT_FETCH_CONCURRENCY,
            )?)
            .provider(provider)
            .build())
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, PipelineError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| PipelineError::InvalidEnvVar { name, value }),
        None => Ok(default),
    }
}
