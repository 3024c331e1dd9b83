use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::model::{ForecastPoint, Location, Readings, Source, WeatherSnapshot};

use super::SourceReader;

/// ONLINE source backed by the OpenWeather current and 5-day/3-hour endpoints.
#[derive(Debug, Clone)]
pub struct OpenWeatherReader {
    api_key: String,
    base_url: String,
    latitude: f64,
    longitude: f64,
    horizon: Duration,
    http: Client,
}

impl OpenWeatherReader {
    pub fn new(
        api_key: String,
        base_url: String,
        location: &Location,
        timeout_secs: u64,
        horizon: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client for OpenWeather")?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            latitude: location.latitude,
            longitude: location.longitude,
            horizon,
            http,
        })
    }

    async fn get(&self, endpoint: &str, what: &str) -> Result<String> {
        let url = format!("{}/{endpoint}", self.base_url);
        let lat = self.latitude.to_string();
        let lon = self.longitude.to_string();

        let res = self
            .http
            .get(&url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to send request to OpenWeather ({what})"))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .with_context(|| format!("Failed to read OpenWeather {what} response body"))?;

        if !status.is_success() {
            return Err(anyhow!(
                "OpenWeather {} request failed with status {}: {}",
                what,
                status,
                truncate_body(&body),
            ));
        }

        Ok(body)
    }

    async fn fetch_current(&self) -> Result<WeatherSnapshot> {
        let body = self.get("weather", "current weather").await?;
        let parsed: OwCurrentResponse =
            serde_json::from_str(&body).context("Failed to parse OpenWeather current JSON")?;

        let observed_at = unix_to_utc(parsed.dt)
            .ok_or_else(|| anyhow!("OpenWeather current response has an invalid timestamp"))?;

        let mut readings = Readings {
            temperature_c: Some(parsed.main.temp),
            humidity_pct: Some(parsed.main.humidity),
            pressure_hpa: parsed.main.pressure,
            wind_speed_ms: parsed.wind.as_ref().map(|w| w.speed),
            wind_direction_deg: parsed.wind.as_ref().and_then(|w| w.deg),
            cloud_cover_pct: parsed.clouds.map(|c| c.all),
            visibility_km: parsed.visibility.map(|m| m / 1000.0),
            condition_text: condition(&parsed.weather),
            ..Readings::default()
        };
        readings.fill_dewpoint();

        Ok(WeatherSnapshot {
            source: Source::Online,
            observed_at,
            readings,
        })
    }

    async fn fetch_forecast(&self) -> Result<Vec<ForecastPoint>> {
        let body = self.get("forecast", "forecast").await?;
        let parsed: OwForecastResponse =
            serde_json::from_str(&body).context("Failed to parse OpenWeather forecast JSON")?;

        let mut points = Vec::with_capacity(parsed.list.len());
        for entry in parsed.list {
            let at = unix_to_utc(entry.dt)
                .ok_or_else(|| anyhow!("OpenWeather forecast entry has an invalid timestamp"))?;
            points.push(ForecastPoint {
                at,
                cloud_cover_pct: entry.clouds.all,
                visibility_km: entry.visibility.map(|m| m / 1000.0),
                condition_text: condition(&entry.weather),
                temperature_c: Some(entry.main.temp),
            });
        }

        if let Some(first) = points.first().map(|p| p.at) {
            let limit = first + self.horizon;
            points.retain(|p| p.at <= limit);
        }

        debug!(points = points.len(), "OpenWeather forecast parsed");
        Ok(points)
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: f64,
    pressure: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwForecastMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
    deg: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwClouds {
    all: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    dt: i64,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    wind: Option<OwWind>,
    clouds: Option<OwClouds>,
    /// Metres.
    visibility: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwForecastMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    clouds: OwClouds,
    visibility: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastEntry>,
}

#[async_trait]
impl SourceReader for OpenWeatherReader {
    fn source(&self) -> Source {
        Source::Online
    }

    async fn read(&self) -> Result<Option<WeatherSnapshot>> {
        self.fetch_current().await.map(Some)
    }

    async fn forecast(&self) -> Result<Option<Vec<ForecastPoint>>> {
        self.fetch_forecast().await.map(Some)
    }
}

fn condition(weather: &[OwWeather]) -> Option<String> {
    weather.first().map(|w| w.description.clone())
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let cut = (0..=MAX).rev().find(|i| body.is_char_boundary(*i)).unwrap_or(0);
        format!("{}...", &body[..cut])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        let body = "°".repeat(150);
        let cut = truncate_body(&body);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= 203);
    }

    #[test]
    fn short_body_is_untouched() {
        assert_eq!(truncate_body("nope"), "nope");
    }
}
