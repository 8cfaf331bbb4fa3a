//! HTTP client for the Hub's reading intake.
//!
//! Each reading is posted on its own as camel-case JSON:
//!
//! ```text
//! POST {base}/api/readings
//! {"sensorType":"temperature","value":21.5,"unit":"C","endpointId":3,"timestamp":1792411200}
//! ```
//!
//! Any 2xx answer is an acknowledgment.
//!
//! # Example
//!
//! ```no_run
//! use fieldnode_core::hub_client::HttpHubClient;
//! use fieldnode_core::HubClient;
//! use fieldnode_types::StoredReading;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hub = HttpHubClient::new("http://hub.local:5000")?;
//! let reading = StoredReading::new(1_792_411_200, "temperature", 21.5, "C", 3);
//! hub.submit_reading(&reading).await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use fieldnode_types::StoredReading;

use crate::error::HubError;
use crate::traits::HubClient;

/// Default bound on one submission.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Wire form of a reading.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReadingPayload<'a> {
    sensor_type: &'a str,
    value: f64,
    unit: &'a str,
    endpoint_id: i64,
    timestamp: u64,
}

impl<'a> From<&'a StoredReading> for ReadingPayload<'a> {
    fn from(reading: &'a StoredReading) -> Self {
        Self {
            sensor_type: &reading.sensor_type,
            value: reading.value,
            unit: &reading.unit,
            endpoint_id: reading.endpoint_id,
            timestamp: reading.timestamp,
        }
    }
}

/// [`HubClient`] speaking HTTP.
#[derive(Debug, Clone)]
pub struct HttpHubClient {
    client: Client,
    base_url: Option<String>,
    timeout: Duration,
}

impl HttpHubClient {
    /// Create a client for `base_url` with the default timeout.
    pub fn new(base_url: &str) -> Result<Self, HubError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client whose requests give up after `timeout`.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, HubError> {
        let base_url = normalize_url(base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HubError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: Some(base_url),
            timeout,
        })
    }

    /// A client without an endpoint; every sync attempt fails until one is
    /// configured.
    pub fn unconfigured() -> Self {
        Self {
            client: Client::new(),
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    fn map_send_error(&self, url: &str, e: reqwest::Error) -> HubError {
        if e.is_timeout() {
            HubError::Timeout(self.timeout)
        } else if e.is_connect() {
            HubError::NotReachable {
                url: url.to_string(),
                message: e.to_string(),
            }
        } else {
            HubError::Transport(e.to_string())
        }
    }
}

fn normalize_url(base_url: &str) -> Result<String, HubError> {
    let base_url = base_url.trim().trim_end_matches('/').to_string();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(HubError::InvalidUrl(format!(
            "URL must start with http:// or https://, got: {}",
            base_url
        )));
    }
    Ok(base_url)
}

#[async_trait]
impl HubClient for HttpHubClient {
    async fn submit_reading(&self, reading: &StoredReading) -> Result<(), HubError> {
        let Some(base_url) = &self.base_url else {
            return Err(HubError::NotConfigured);
        };
        let url = format!("{}/api/readings", base_url);

        let response = self
            .client
            .post(&url)
            .json(&ReadingPayload::from(reading))
            .send()
            .await
            .map_err(|e| self.map_send_error(&url, e))?;

        let status = response.status();
        if status.is_success() {
            debug!("Hub acknowledged {} reading {}", reading.sensor_type, reading.timestamp);
            return Ok(());
        }

        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or_else(|| status.to_string());

        Err(HubError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = HttpHubClient::new("http://hub.local:5000/").unwrap();
        assert_eq!(client.base_url(), Some("http://hub.local:5000"));
        assert!(client.is_configured());
    }

    #[test]
    fn test_invalid_url() {
        let err = HttpHubClient::new("hub.local:5000").unwrap_err();
        assert!(matches!(err, HubError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_unconfigured_client() {
        let client = HttpHubClient::unconfigured();
        assert!(!client.is_configured());
        let reading = StoredReading::new(1, "co2", 400.0, "ppm", 1);
        assert_eq!(
            client.submit_reading(&reading).await,
            Err(HubError::NotConfigured)
        );
    }

    #[test]
    fn test_payload_uses_camel_case() {
        let reading = StoredReading::new(1_792_411_200, "temperature", 21.5, "C", 3);
        let json = serde_json::to_value(ReadingPayload::from(&reading)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "sensorType": "temperature",
                "value": 21.5,
                "unit": "C",
                "endpointId": 3,
                "timestamp": 1_792_411_200u64,
            })
        );
    }
}
