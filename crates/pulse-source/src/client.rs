//! HTTP instrument source.
//!
//! Fetches `GET {base_url}/instruments?category=<category>`, which returns a
//! JSON array of instruments.

use crate::error::{SourceError, SourceResult};
use crate::source::InstrumentSource;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use pulse_core::{Category, Instrument};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// REST client for the instrument list endpoint.
#[derive(Debug, Clone)]
pub struct RestInstrumentSource {
    client: Client,
    base_url: String,
}

impl RestInstrumentSource {
    pub fn new(base_url: impl Into<String>) -> SourceResult<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> SourceResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/instruments", self.base_url)
    }

    async fn fetch_category(
        client: Client,
        url: String,
        category: Category,
    ) -> SourceResult<Vec<Instrument>> {
        info!(%url, %category, "Fetching instruments");

        let response = client
            .get(&url)
            .query(&[("category", category.as_str())])
            .send()
            .await
            .map_err(|e| SourceError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SourceError::HttpClient(format!("Failed to read response: {e}")))?;
        let instruments: Vec<Instrument> = serde_json::from_slice(&body)
            .map_err(|e| SourceError::Decode(format!("{category}: {e}")))?;

        debug!(%category, count = instruments.len(), "Instruments received");
        Ok(instruments)
    }
}

impl InstrumentSource for RestInstrumentSource {
    fn fetch(&self, category: Category) -> BoxFuture<'static, SourceResult<Vec<Instrument>>> {
        Self::fetch_category(self.client.clone(), self.endpoint(), category).boxed()
    }
}
