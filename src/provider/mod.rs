//! Boundary to the external weather provider.
//!
//! The [`WeatherProvider`] trait is the seam between the ingestor and the HTTP
//! client; [`noaa::NoaaClient`] implements it for the NOAA CDO v2 API.

pub mod error;
pub mod noaa;
pub mod query;

use crate::provider::error::ProviderError;
use crate::provider::query::ProviderQuery;
use crate::types::record::FieldValue;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One flat `{date, station, datatype, value}` row as returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub station: Option<String>,
    pub datatype: String,
    #[serde(default)]
    pub value: FieldValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<String>,
}

impl Observation {
    pub fn new(
        date: impl Into<String>,
        station: impl Into<String>,
        datatype: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Self {
        Self {
            date: Some(date.into()),
            station: Some(station.into()),
            datatype: datatype.into(),
            value: value.into(),
            attributes: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    pub offset: u32,
    pub count: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub resultset: ResultSet,
}

/// Body of a successful provider response. The provider answers `{}` when a
/// window has no data, so both fields default to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    #[serde(default)]
    pub metadata: Option<ResponseMetadata>,
    #[serde(default)]
    pub results: Vec<Observation>,
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Performs exactly one provider call for `query`. Implementations must
    /// not retry internally.
    async fn fetch(&self, query: &ProviderQuery) -> Result<ProviderResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_cdo_response() -> Result<(), serde_json::Error> {
        let body = r#"{
            "metadata": {"resultset": {"offset": 1, "count": 2, "limit": 1000}},
            "results": [
                {"date": "2025-04-01T00:00:00", "datatype": "TMAX", "station": "GHCND:USW00023234", "attributes": ",,W,2400", "value": 70},
                {"date": "2025-04-01T00:00:00", "datatype": "PRCP", "station": "GHCND:USW00023234", "attributes": ",,W,2400", "value": 0.02}
            ]
        }"#;
        let response: ProviderResponse = serde_json::from_str(body)?;
        assert_eq!(response.metadata.unwrap().resultset.count, 2);
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].value, FieldValue::Integer(70));
        assert_eq!(response.results[1].value, FieldValue::Float(0.02));
        assert_eq!(response.results[1].attributes.as_deref(), Some(",,W,2400"));
        Ok(())
    }

    #[test]
    fn test_decode_empty_object() -> Result<(), serde_json::Error> {
        let response: ProviderResponse = serde_json::from_str("{}")?;
        assert!(response.results.is_empty());
        assert!(response.metadata.is_none());
        Ok(())
    }
}
