//! Forecast assembler: runs reconcile and scoring over one set of reader
//! outcomes and produces the forecast document.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::astronomy::{AstronomySummary, SkyClock};
use crate::config::ScoringConfig;
use crate::error::EngineError;
use crate::model::{Forecast, ForecastPoint, Location, SkyQuality, Source, WeatherSnapshot};
use crate::reconcile::reconcile;
use crate::scoring::WindowScorer;

/// What the readers produced for one invocation.
///
/// `Ok(None)` is "configured but no data yet", `Err` is a failed adapter.
#[derive(Debug)]
pub struct SourceReadings {
    pub local: Result<Option<WeatherSnapshot>>,
    pub online: Result<Option<WeatherSnapshot>>,
    pub series: Result<Option<Vec<ForecastPoint>>>,
}

impl SourceReadings {
    /// Neither source produced anything.
    pub fn none() -> Self {
        Self {
            local: Ok(None),
            online: Ok(None),
            series: Ok(None),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ForecastAssembler {
    location: Location,
    scoring: ScoringConfig,
    sky: SkyClock,
}

impl ForecastAssembler {
    pub fn new(location: Location, scoring: ScoringConfig) -> Result<Self, EngineError> {
        scoring.validate()?;
        let sky = SkyClock::new(&location)?;
        Ok(Self {
            location,
            scoring,
            sky,
        })
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Build the forecast document.
    ///
    /// Never fails: unavailable sources degrade the document, and a malformed
    /// series leaves `windows` empty with a note in `errors`.
    pub fn assemble(&self, readings: SourceReadings, now: DateTime<Utc>) -> Forecast {
        let mut errors = Vec::new();

        let local = take_snapshot(Source::Local, readings.local, &mut errors);
        let online = take_snapshot(Source::Online, readings.online, &mut errors);

        let current = reconcile(local.as_ref(), online.as_ref(), now, self.scoring.staleness());

        let (windows, forecast) = match readings.series {
            Ok(Some(points)) => {
                let scorer = WindowScorer::new(&self.scoring, &self.sky);
                let scored = scorer
                    .score_windows(&current, &points, now)
                    .and_then(|windows| Ok((windows, scorer.horizon_series(&points, now)?)));
                match scored {
                    Ok(scored) => scored,
                    Err(err) => {
                        warn!(error = %err, "forecast series rejected");
                        errors.push(err.to_string());
                        (Vec::new(), Vec::new())
                    }
                }
            }
            Ok(None) => {
                debug!("no forecast series available");
                (Vec::new(), Vec::new())
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "forecast series unavailable");
                errors.push(format!("ONLINE forecast: {err:#}"));
                (Vec::new(), Vec::new())
            }
        };

        info!(
            local = ?current.availability_of(Source::Local),
            online = ?current.availability_of(Source::Online),
            windows = windows.len(),
            "forecast assembled"
        );

        Forecast {
            generated_at: now,
            location: self.location.clone(),
            source_status: current.availability.clone(),
            sky_quality: SkyQuality::from_current(&current),
            astronomy: AstronomySummary::at(&self.sky, now),
            current,
            windows,
            forecast,
            errors,
        }
    }
}

fn take_snapshot(
    role: Source,
    outcome: Result<Option<WeatherSnapshot>>,
    errors: &mut Vec<String>,
) -> Option<WeatherSnapshot> {
    match outcome {
        Ok(Some(snapshot)) if snapshot.source != role => {
            warn!(expected = %role, got = %snapshot.source, "snapshot from the wrong source");
            errors.push(format!("{role}: snapshot labelled {}", snapshot.source));
            None
        }
        Ok(Some(snapshot)) => Some(snapshot),
        Ok(None) => {
            debug!(source = %role, "source has no data yet");
            None
        }
        Err(err) => {
            warn!(source = %role, error = %format!("{err:#}"), "source unavailable");
            errors.push(format!("{role}: {err:#}"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MergedWeather, SourceAvailability};
    use anyhow::anyhow;
    use chrono::TimeZone;

    fn assembler() -> ForecastAssembler {
        ForecastAssembler::new(Location::default(), ScoringConfig::default()).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 19, 0, 0).unwrap()
    }

    #[test]
    fn failed_readers_are_recorded_not_raised() {
        let readings = SourceReadings {
            local: Err(anyhow!("Failed to read sensor file: /nope")),
            online: Err(anyhow!("No API key configured")),
            series: Ok(None),
        };
        let forecast = assembler().assemble(readings, now());

        assert_eq!(forecast.current, MergedWeather::empty());
        assert!(forecast.windows.is_empty());
        assert_eq!(forecast.errors.len(), 2);
        assert!(forecast.errors[0].starts_with("LOCAL: Failed to read sensor file"));
        assert!(forecast.errors[1].starts_with("ONLINE: No API key"));
    }

    #[test]
    fn malformed_series_yields_empty_windows_and_annotation() {
        let point = ForecastPoint {
            at: now(),
            cloud_cover_pct: 0.0,
            visibility_km: Some(20.0),
            condition_text: None,
            temperature_c: None,
        };
        let readings = SourceReadings {
            series: Ok(Some(vec![point.clone(), point])),
            ..SourceReadings::none()
        };
        let forecast = assembler().assemble(readings, now());

        assert!(forecast.windows.is_empty());
        assert!(forecast.forecast.is_empty());
        assert_eq!(forecast.errors.len(), 1);
        assert!(forecast.errors[0].contains("malformed forecast series"));
    }

    #[test]
    fn mislabelled_snapshot_is_dropped() {
        let readings = SourceReadings {
            local: Ok(Some(WeatherSnapshot::new(Source::Online, now()))),
            ..SourceReadings::none()
        };
        let forecast = assembler().assemble(readings, now());
        assert_eq!(
            forecast.source_status.get(&Source::Local),
            Some(&SourceAvailability::Unavailable)
        );
        assert_eq!(forecast.errors, vec!["LOCAL: snapshot labelled ONLINE".to_string()]);
    }

    #[test]
    fn invalid_scoring_config_is_rejected() {
        let scoring = ScoringConfig {
            horizon_hours: 0,
            ..ScoringConfig::default()
        };
        assert!(ForecastAssembler::new(Location::default(), scoring).is_err());
    }
}
