use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::model::{Source, WeatherSnapshot};

use super::{SourceReader, parse_sensor_body};

/// LOCAL source polling a station's JSON endpoint.
#[derive(Debug, Clone)]
pub struct SensorHttpReader {
    url: String,
    http: Client,
}

impl SensorHttpReader {
    pub fn new(url: String, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client for the sensor endpoint")?;
        Ok(Self { url, http })
    }
}

#[async_trait]
impl SourceReader for SensorHttpReader {
    fn source(&self) -> Source {
        Source::Local
    }

    async fn read(&self) -> Result<Option<WeatherSnapshot>> {
        let res = self
            .http
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Failed to reach sensor endpoint {}", self.url))?;

        let status = res.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(anyhow!(
                "Sensor endpoint {} answered with status {}",
                self.url,
                status
            ));
        }

        let body = res
            .text()
            .await
            .context("Failed to read sensor endpoint response body")?;

        parse_sensor_body(&body)
    }
}
