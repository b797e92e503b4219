use crate::config::ProviderSettings;
use crate::provider::error::ProviderError;
use crate::provider::query::ProviderQuery;
use crate::provider::{ProviderResponse, WeatherProvider};
use async_trait::async_trait;
use log::{info, warn};
use reqwest::Client;

/// HTTP client for the NOAA Climate Data Online v2 `data` endpoint.
pub struct NoaaClient {
    client: Client,
    api_url: String,
    token: Option<String>,
}

impl NoaaClient {
    pub fn new(settings: &ProviderSettings) -> Self {
        Self::with_client(Client::new(), settings)
    }

    /// Uses a preconfigured `reqwest` client, e.g. one with custom timeouts.
    pub fn with_client(client: Client, settings: &ProviderSettings) -> Self {
        Self {
            client,
            api_url: settings.api_url.clone(),
            token: settings.token.clone(),
        }
    }
}

#[async_trait]
impl WeatherProvider for NoaaClient {
    async fn fetch(&self, query: &ProviderQuery) -> Result<ProviderResponse, ProviderError> {
        info!(
            "Requesting {} observations for station {} in {}",
            query.dataset_id, query.station_id, query.window
        );

        let mut request = self.client.get(&self.api_url).query(&query.to_params());
        if let Some(token) = &self.token {
            request = request.header("token", token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::NetworkRequest(self.api_url.clone(), e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("HTTP error for {}: {} {}", self.api_url, status, body);
            return Err(ProviderError::HttpStatus {
                url: self.api_url.clone(),
                status,
                body,
            });
        }

        let decoded = response
            .json::<ProviderResponse>()
            .await
            .map_err(|e| ProviderError::Decode {
                url: self.api_url.clone(),
                source: e,
            })?;
        info!(
            "Received {} observations for station {}",
            decoded.results.len(),
            query.station_id
        );
        Ok(decoded)
    }
}
