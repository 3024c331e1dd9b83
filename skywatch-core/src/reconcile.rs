//! Field reconciler: merges the LOCAL and ONLINE snapshots into one record.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::model::{
    Field, FieldSource, MergedWeather, Source, SourceAvailability, WeatherSnapshot,
};

/// Availability of the LOCAL snapshot at `now`.
///
/// A reading older than `staleness` is STALE. Readings stamped in the future
/// (sensor clock ahead) count as fresh.
pub fn local_availability(
    local: Option<&WeatherSnapshot>,
    now: DateTime<Utc>,
    staleness: Duration,
) -> SourceAvailability {
    match local {
        None => SourceAvailability::Unavailable,
        Some(snapshot) if now - snapshot.observed_at > staleness => SourceAvailability::Stale,
        Some(_) => SourceAvailability::Available,
    }
}

pub fn online_availability(online: Option<&WeatherSnapshot>) -> SourceAvailability {
    match online {
        None => SourceAvailability::Unavailable,
        Some(_) => SourceAvailability::Available,
    }
}

/// Merge two snapshots field by field.
///
/// Each field takes its primary source's value when present, else the
/// fallback's, else stays absent. A STALE local snapshot supplies nothing.
pub fn reconcile(
    local: Option<&WeatherSnapshot>,
    online: Option<&WeatherSnapshot>,
    now: DateTime<Utc>,
    staleness: Duration,
) -> MergedWeather {
    let local_status = local_availability(local, now, staleness);
    let online_status = online_availability(online);

    if local_status == SourceAvailability::Stale {
        if let Some(snapshot) = local {
            debug!(
                observed_at = %snapshot.observed_at,
                age_secs = (now - snapshot.observed_at).num_seconds(),
                "local snapshot is stale, ignoring its readings"
            );
        }
    }

    let usable_local = local.filter(|_| local_status == SourceAvailability::Available);
    let candidate = |source: Source| match source {
        Source::Local => usable_local,
        Source::Online => online,
    };

    let mut merged = MergedWeather::empty();
    merged.availability.insert(Source::Local, local_status);
    merged.availability.insert(Source::Online, online_status);

    for field in Field::ALL {
        let supplier = [field.primary(), field.fallback()]
            .into_iter()
            .find_map(|source| {
                candidate(source)
                    .filter(|snapshot| snapshot.readings.has(field))
                    .map(|snapshot| (source, snapshot))
            });

        let used = match supplier {
            Some((source, snapshot)) => {
                merged.readings.copy_field(field, &snapshot.readings);
                FieldSource::from(source)
            }
            None => FieldSource::None,
        };
        merged.sources_used.insert(field, used);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 20, 0, 0).unwrap()
    }

    fn staleness() -> Duration {
        Duration::minutes(10)
    }

    fn local_at(observed_at: DateTime<Utc>) -> WeatherSnapshot {
        let mut snap = WeatherSnapshot::new(Source::Local, observed_at);
        snap.readings.temperature_c = Some(14.8);
        snap.readings.humidity_pct = Some(67.5);
        snap.readings.wind_speed_ms = Some(2.0);
        snap
    }

    fn online() -> WeatherSnapshot {
        let mut snap = WeatherSnapshot::new(Source::Online, now() - Duration::minutes(30));
        snap.readings.temperature_c = Some(10.0);
        snap.readings.humidity_pct = Some(80.0);
        snap.readings.pressure_hpa = Some(1013.0);
        snap.readings.cloud_cover_pct = Some(20.0);
        snap.readings.visibility_km = Some(15.0);
        snap.readings.condition_text = Some("few clouds".to_string());
        snap
    }

    #[test]
    fn fresh_local_wins_primary_fields() {
        let local = local_at(now());
        let online = online();
        let merged = reconcile(Some(&local), Some(&online), now(), staleness());

        assert_eq!(merged.readings.temperature_c, Some(14.8));
        assert_eq!(merged.source_of(Field::TemperatureC), FieldSource::Local);
        assert_eq!(merged.readings.humidity_pct, Some(67.5));
        assert_eq!(merged.readings.cloud_cover_pct, Some(20.0));
        assert_eq!(merged.source_of(Field::CloudCoverPct), FieldSource::Online);
        assert_eq!(merged.availability_of(Source::Local), SourceAvailability::Available);
    }

    #[test]
    fn missing_local_field_falls_back_to_online() {
        let local = local_at(now());
        let online = online();
        let merged = reconcile(Some(&local), Some(&online), now(), staleness());

        assert_eq!(merged.readings.pressure_hpa, Some(1013.0));
        assert_eq!(merged.source_of(Field::PressureHpa), FieldSource::Online);
    }

    #[test]
    fn online_primary_field_falls_back_to_local() {
        let mut local = local_at(now());
        local.readings.cloud_cover_pct = Some(75.0);
        let merged = reconcile(Some(&local), None, now(), staleness());

        assert_eq!(merged.readings.cloud_cover_pct, Some(75.0));
        assert_eq!(merged.source_of(Field::CloudCoverPct), FieldSource::Local);
        assert_eq!(merged.availability_of(Source::Online), SourceAvailability::Unavailable);
    }

    #[test]
    fn stale_local_is_ignored() {
        let local = local_at(now() - Duration::minutes(11));
        let online = online();
        let merged = reconcile(Some(&local), Some(&online), now(), staleness());

        assert_eq!(merged.availability_of(Source::Local), SourceAvailability::Stale);
        assert_eq!(merged.readings.temperature_c, Some(10.0));
        assert_eq!(merged.source_of(Field::TemperatureC), FieldSource::Online);
        assert_eq!(merged.readings.wind_speed_ms, None);
        assert_eq!(merged.source_of(Field::WindSpeedMs), FieldSource::None);
    }

    #[test]
    fn exactly_at_threshold_is_still_fresh() {
        let local = local_at(now() - staleness());
        assert_eq!(
            local_availability(Some(&local), now(), staleness()),
            SourceAvailability::Available
        );
    }

    #[test]
    fn nothing_in_nothing_out() {
        let merged = reconcile(None, None, now(), staleness());
        assert_eq!(merged, MergedWeather::empty());
    }
}
