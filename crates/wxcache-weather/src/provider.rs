use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ProviderError;
use crate::types::{Units, WeatherDocument};

const FORECAST_PATH: &str = "/data/2.5/forecast";
const USER_AGENT: &str = concat!("wxcache/", env!("CARGO_PKG_VERSION"));

/// Longest response body excerpt kept in a status error
const MAX_ERROR_BODY: usize = 512;

/// Source of forecast documents.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Download the forecast for `query` in `units`.
    async fn fetch(&self, query: &str, units: Units) -> Result<WeatherDocument, ProviderError>;
}

/// OpenWeatherMap 5 day / 3 hour forecast endpoint.
#[derive(Debug, Clone)]
pub struct OpenWeatherMapProvider {
    client: Arc<Client>,
    base_url: String,
    api_key: String,
}

impl OpenWeatherMapProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherMapProvider {
    async fn fetch(&self, query: &str, units: Units) -> Result<WeatherDocument, ProviderError> {
        let url = format!("{}{}", self.base_url, FORECAST_PATH);
        tracing::debug!("Downloading forecast for {:?} ({}) from {}", query, units, url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", query),
                ("appid", self.api_key.as_str()),
                ("units", units.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut end = MAX_ERROR_BODY;
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                body.truncate(end);
            }
            tracing::debug!("Forecast request returned status {}", status);
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let document = WeatherDocument::from_slice(&bytes)?;
        tracing::info!(
            "Downloaded forecast for {} ({} entries)",
            document.city_name(),
            document.entries().len()
        );
        Ok(document)
    }
}
