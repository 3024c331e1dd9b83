use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use crate::model::{Source, WeatherSnapshot};

use super::{SourceReader, parse_sensor_body};

/// LOCAL source reading the JSON file a station daemon keeps up to date.
///
/// The file is owned by the daemon; this reader never writes it.
#[derive(Debug, Clone)]
pub struct SensorFileReader {
    path: PathBuf,
}

impl SensorFileReader {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl SourceReader for SensorFileReader {
    fn source(&self) -> Source {
        Source::Local
    }

    async fn read(&self) -> Result<Option<WeatherSnapshot>> {
        let body = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read sensor file: {}", self.path.display()))?;

        debug!(path = %self.path.display(), bytes = body.len(), "sensor file read");

        parse_sensor_body(&body)
            .with_context(|| format!("Invalid sensor file: {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn reads_and_normalizes_aliases() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"timestamp": "2026-10-17T20:00:00Z", "temp_c": 14.8, "rh": 67.5, "wind_speed_kmh": 18.0}}"#
        )
        .unwrap();

        let reader = SensorFileReader::new(file.path().to_path_buf());
        let snap = reader.read().await.unwrap().expect("snapshot expected");

        assert_eq!(snap.source, Source::Local);
        assert_eq!(snap.readings.temperature_c, Some(14.8));
        assert_eq!(snap.readings.humidity_pct, Some(67.5));
        assert!((snap.readings.wind_speed_ms.unwrap() - 5.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let reader = SensorFileReader::new(dir.path().join("current.json"));
        let err = reader.read().await.unwrap_err();
        assert!(err.to_string().contains("Failed to read sensor file"));
    }

    #[tokio::test]
    async fn empty_file_means_no_data_yet() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let reader = SensorFileReader::new(file.path().to_path_buf());
        assert!(reader.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn record_without_timestamp_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"temperature": 3.0}}"#).unwrap();

        let reader = SensorFileReader::new(file.path().to_path_buf());
        let err = reader.read().await.unwrap_err();
        assert!(format!("{err:#}").contains("no timestamp"));
    }
}
