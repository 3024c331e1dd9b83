use anyhow::{Context, anyhow};
use async_trait::async_trait;
use std::fmt::Debug;
use tracing::debug;

use crate::{
    Config, SensorKind, SourceReadings,
    model::{ForecastPoint, Source, WeatherSnapshot},
    normalize::snapshot_from_json,
    reader::{openweather::OpenWeatherReader, sensor_file::SensorFileReader, sensor_http::SensorHttpReader},
};

pub mod openweather;
pub mod sensor_file;
pub mod sensor_http;

/// A weather source the engine can pull one snapshot from.
///
/// `Ok(None)` means the source is configured but has nothing yet; `Err`
/// means the adapter itself failed. Readers own their timeouts and retries.
#[async_trait]
pub trait SourceReader: Send + Sync + Debug {
    fn source(&self) -> Source;

    async fn read(&self) -> anyhow::Result<Option<WeatherSnapshot>>;

    /// Future series, for sources that publish one.
    async fn forecast(&self) -> anyhow::Result<Option<Vec<ForecastPoint>>> {
        Ok(None)
    }
}

/// Construct the LOCAL reader selected by `[local] kind`.
pub fn local_reader_from_config(config: &Config) -> anyhow::Result<Box<dyn SourceReader>> {
    let local = &config.local;
    let boxed: Box<dyn SourceReader> = match local.kind {
        SensorKind::File => Box::new(SensorFileReader::new(local.path.clone())),
        SensorKind::Http => {
            let url = local.url.clone().ok_or_else(|| {
                anyhow!(
                    "No URL configured for the HTTP sensor.\n\
                     Hint: set `url` in the [local] section of the config file."
                )
            })?;
            Box::new(SensorHttpReader::new(url, local.timeout_secs)?)
        }
    };
    Ok(boxed)
}

/// Construct the ONLINE reader; fails when no API key is configured.
pub fn online_reader_from_config(config: &Config) -> anyhow::Result<Box<dyn SourceReader>> {
    let api_key = config.api_key().ok_or_else(|| {
        anyhow!(
            "No API key configured for OpenWeather.\n\
             Hint: run `skywatch configure` or set OPENWEATHER_API_KEY."
        )
    })?;

    let reader = OpenWeatherReader::new(
        api_key,
        config.online.base_url.clone(),
        &config.location,
        config.online.timeout_secs,
        config.scoring.horizon(),
    )?;
    Ok(Box::new(reader))
}

/// Run both readers concurrently and gather their outcomes.
///
/// A reader that could not be constructed counts as a failed source.
pub async fn collect_readings(
    local: anyhow::Result<Box<dyn SourceReader>>,
    online: anyhow::Result<Box<dyn SourceReader>>,
) -> SourceReadings {
    let local_fut = async {
        match &local {
            Ok(reader) => reader.read().await,
            Err(err) => Err(anyhow!("{err:#}")),
        }
    };

    let online_fut = async {
        match &online {
            Ok(reader) => tokio::join!(reader.read(), reader.forecast()),
            Err(err) => (Err(anyhow!("{err:#}")), Ok(None)),
        }
    };

    let (local, (online, series)) = tokio::join!(local_fut, online_fut);
    debug!(
        local_ok = local.is_ok(),
        online_ok = online.is_ok(),
        series_ok = series.is_ok(),
        "readers finished"
    );

    SourceReadings {
        local,
        online,
        series,
    }
}

/// Parse a sensor daemon's JSON body into a LOCAL snapshot.
///
/// A blank body means the daemon has not written anything yet.
pub(crate) fn parse_sensor_body(body: &str) -> anyhow::Result<Option<WeatherSnapshot>> {
    if body.trim().is_empty() {
        return Ok(None);
    }

    let value: serde_json::Value =
        serde_json::from_str(body).context("Failed to parse sensor JSON")?;

    snapshot_from_json(Source::Local, &value).context("Sensor record could not be normalized")
}
