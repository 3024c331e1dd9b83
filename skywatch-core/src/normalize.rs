//! Snapshot construction from loosely-keyed sensor records.
//!
//! Station daemons disagree on key names (`temp`, `temperature`, `rh`, ...)
//! and sometimes on units. All of that is resolved here, once, through an
//! explicit alias table; everything downstream sees canonical fields only.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::error::NormalizeError;
use crate::model::{Field, Readings, Source, WeatherSnapshot};

const KMH_TO_MS: f64 = 1.0 / 3.6;

/// `alias → (canonical field, multiplier to canonical unit)`.
///
/// When a record carries several aliases of one field, the earliest entry wins.
pub const NUMERIC_ALIASES: &[(&str, Field, f64)] = &[
    ("temperature", Field::TemperatureC, 1.0),
    ("temp", Field::TemperatureC, 1.0),
    ("temp_c", Field::TemperatureC, 1.0),
    ("temperature_c", Field::TemperatureC, 1.0),
    ("outdoor_temp", Field::TemperatureC, 1.0),
    ("humidity", Field::HumidityPct, 1.0),
    ("rh", Field::HumidityPct, 1.0),
    ("humidity_pct", Field::HumidityPct, 1.0),
    ("relative_humidity", Field::HumidityPct, 1.0),
    ("pressure", Field::PressureHpa, 1.0),
    ("pressure_hpa", Field::PressureHpa, 1.0),
    ("barometric_pressure", Field::PressureHpa, 1.0),
    ("baro", Field::PressureHpa, 1.0),
    ("dewpoint", Field::DewpointC, 1.0),
    ("dew_point", Field::DewpointC, 1.0),
    ("dewpoint_c", Field::DewpointC, 1.0),
    ("wind_speed", Field::WindSpeedMs, 1.0),
    ("wind", Field::WindSpeedMs, 1.0),
    ("wind_speed_ms", Field::WindSpeedMs, 1.0),
    ("wind_speed_kmh", Field::WindSpeedMs, KMH_TO_MS),
    ("wind_kmh", Field::WindSpeedMs, KMH_TO_MS),
    ("wind_direction", Field::WindDirectionDeg, 1.0),
    ("wind_dir", Field::WindDirectionDeg, 1.0),
    ("wind_direction_deg", Field::WindDirectionDeg, 1.0),
    ("cloud_cover", Field::CloudCoverPct, 1.0),
    ("clouds", Field::CloudCoverPct, 1.0),
    ("cloud_cover_pct", Field::CloudCoverPct, 1.0),
    ("visibility", Field::VisibilityKm, 1.0),
    ("visibility_km", Field::VisibilityKm, 1.0),
];

pub const CONDITION_ALIASES: &[&str] = &["condition", "conditions", "condition_text"];

pub const TIMESTAMP_KEY: &str = "timestamp";

/// Build a snapshot from a raw JSON record.
///
/// An empty object means the source has no data yet and yields `Ok(None)`.
/// Unknown keys are ignored; `null` values count as missing.
pub fn snapshot_from_json(
    source: Source,
    value: &Value,
) -> Result<Option<WeatherSnapshot>, NormalizeError> {
    let record = value.as_object().ok_or(NormalizeError::NotAnObject)?;
    if record.is_empty() {
        return Ok(None);
    }

    let observed_at = match record.get(TIMESTAMP_KEY) {
        None | Some(Value::Null) => return Err(NormalizeError::MissingTimestamp),
        Some(Value::String(raw)) => parse_timestamp(raw)?,
        Some(other) => {
            return Err(NormalizeError::InvalidTimestamp {
                value: other.to_string(),
            });
        }
    };

    Ok(Some(WeatherSnapshot {
        source,
        observed_at,
        readings: readings_from_record(record)?,
    }))
}

fn readings_from_record(record: &Map<String, Value>) -> Result<Readings, NormalizeError> {
    let mut readings = Readings::default();

    for &(alias, field, scale) in NUMERIC_ALIASES {
        if readings.has(field) {
            continue;
        }
        match record.get(alias) {
            None | Some(Value::Null) => {}
            Some(raw) => readings.set_number(field, parse_number(alias, raw)? * scale),
        }
    }

    readings.condition_text = CONDITION_ALIASES
        .iter()
        .filter_map(|alias| record.get(*alias))
        .find_map(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    readings.fill_dewpoint();
    Ok(readings)
}

fn parse_number(key: &str, raw: &Value) -> Result<f64, NormalizeError> {
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed
        .filter(|n| n.is_finite())
        .ok_or_else(|| NormalizeError::InvalidNumber {
            key: key.to_string(),
            value: raw.to_string(),
        })
}

/// Parse an ISO-8601 timestamp. Values without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, NormalizeError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }

    Err(NormalizeError::InvalidTimestamp {
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn local(value: Value) -> WeatherSnapshot {
        snapshot_from_json(Source::Local, &value)
            .expect("record should normalize")
            .expect("record should not be empty")
    }

    #[test]
    fn temperature_aliases_are_equivalent() {
        for alias in ["temperature", "temp", "temp_c"] {
            let snap = local(json!({ "timestamp": "2026-10-17T20:00:00Z", alias: 14.8 }));
            assert_eq!(snap.readings.temperature_c, Some(14.8), "alias {alias}");
        }
    }

    #[test]
    fn first_alias_in_table_wins() {
        let snap = local(json!({
            "timestamp": "2026-10-17T20:00:00Z",
            "temp": 3.0,
            "temperature": 4.0,
        }));
        assert_eq!(snap.readings.temperature_c, Some(4.0));
    }

    #[test]
    fn kmh_wind_is_converted() {
        let snap = local(json!({
            "timestamp": "2026-10-17T20:00:00Z",
            "wind_speed_kmh": 36.0,
        }));
        let ms = snap.readings.wind_speed_ms.unwrap();
        assert!((ms - 10.0).abs() < 1e-9);
    }

    #[test]
    fn numeric_strings_are_accepted_and_unknown_keys_ignored() {
        let snap = local(json!({
            "timestamp": "2026-10-17T20:00:00Z",
            "humidity": " 65 ",
            "station_name": "AAG CloudSensor",
        }));
        assert_eq!(snap.readings.humidity_pct, Some(65.0));
        assert_eq!(snap.readings.temperature_c, None);
    }

    #[test]
    fn dewpoint_is_derived_when_missing() {
        let snap = local(json!({
            "timestamp": "2026-10-17T20:00:00Z",
            "temperature": 14.8,
            "humidity": 67.5,
        }));
        assert_eq!(snap.readings.dewpoint_c, Some(8.8));
    }

    #[test]
    fn empty_record_means_no_data() {
        assert!(snapshot_from_json(Source::Local, &json!({})).unwrap().is_none());
    }

    #[test]
    fn missing_timestamp_is_rejected() {
        let err = snapshot_from_json(Source::Local, &json!({ "temp": 1.0 })).unwrap_err();
        assert!(matches!(err, NormalizeError::MissingTimestamp));
    }

    #[test]
    fn garbage_number_is_rejected() {
        let err = snapshot_from_json(
            Source::Local,
            &json!({ "timestamp": "2026-10-17T20:00:00Z", "pressure": "n/a" }),
        )
        .unwrap_err();
        assert!(matches!(err, NormalizeError::InvalidNumber { ref key, .. } if key == "pressure"));
    }

    #[test]
    fn non_object_is_rejected() {
        let err = snapshot_from_json(Source::Local, &json!([1, 2])).unwrap_err();
        assert!(matches!(err, NormalizeError::NotAnObject));
    }

    #[test]
    fn timestamps_with_offset_and_naive() {
        let expected = Utc.with_ymd_and_hms(2026, 10, 17, 18, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2026-10-17T20:00:00+02:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2026-10-17T18:00:00.123456").unwrap().timestamp(), expected.timestamp());
        assert_eq!(parse_timestamp("2026-10-17 18:00:00").unwrap(), expected);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn condition_text_is_trimmed() {
        let snap = local(json!({
            "timestamp": "2026-10-17T20:00:00Z",
            "conditions": "  clear sky ",
        }));
        assert_eq!(snap.readings.condition_text.as_deref(), Some("clear sky"));
    }
}
