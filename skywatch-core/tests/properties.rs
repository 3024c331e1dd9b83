//! Property checks for the field reconciler.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use skywatch_core::reconcile::reconcile;
use skywatch_core::{Field, FieldSource, Readings, Source, SourceAvailability, WeatherSnapshot};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 17, 20, 0, 0).unwrap()
}

fn readings() -> impl Strategy<Value = Readings> {
    let number = || proptest::option::of(-50.0f64..1100.0);
    (
        number(),
        number(),
        number(),
        number(),
        number(),
        number(),
        number(),
        number(),
        proptest::option::of("[a-z ]{1,12}"),
    )
        .prop_map(|(t, h, p, d, ws, wd, c, v, text)| Readings {
            temperature_c: t,
            humidity_pct: h,
            pressure_hpa: p,
            dewpoint_c: d,
            wind_speed_ms: ws,
            wind_direction_deg: wd,
            cloud_cover_pct: c,
            visibility_km: v,
            condition_text: text,
        })
}

fn snapshot(source: Source) -> impl Strategy<Value = Option<WeatherSnapshot>> {
    proptest::option::of((readings(), 0i64..60).prop_map(move |(readings, age_minutes)| {
        WeatherSnapshot {
            source,
            observed_at: now() - Duration::minutes(age_minutes),
            readings,
        }
    }))
}

fn same_value(field: Field, a: &Readings, b: &Readings) -> bool {
    match field {
        Field::ConditionText => a.condition_text == b.condition_text,
        numeric => a.number(numeric) == b.number(numeric),
    }
}

proptest! {
    #[test]
    fn every_merged_field_is_traceable(
        local in snapshot(Source::Local),
        online in snapshot(Source::Online),
    ) {
        let merged = reconcile(local.as_ref(), online.as_ref(), now(), Duration::minutes(10));

        for field in Field::ALL {
            let supplier = match merged.source_of(field) {
                FieldSource::Local => local.as_ref(),
                FieldSource::Online => online.as_ref(),
                FieldSource::None => {
                    prop_assert!(!merged.readings.has(field), "{field} present without a source");
                    continue;
                }
            };
            let supplier = supplier.expect("recorded source must exist");
            prop_assert!(supplier.readings.has(field), "{field} traced to a source without it");
            prop_assert!(same_value(field, &merged.readings, &supplier.readings));
        }
    }

    #[test]
    fn stale_local_never_supplies(
        local in snapshot(Source::Local),
        online in snapshot(Source::Online),
    ) {
        let staleness = Duration::minutes(10);
        let merged = reconcile(local.as_ref(), online.as_ref(), now(), staleness);

        let stale = local
            .as_ref()
            .is_some_and(|s| now() - s.observed_at > staleness);
        if stale {
            prop_assert_eq!(merged.availability_of(Source::Local), SourceAvailability::Stale);
            for field in Field::ALL {
                prop_assert_ne!(merged.source_of(field), FieldSource::Local);
            }
        }
    }
}
